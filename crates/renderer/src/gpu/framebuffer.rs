use crate::error::FramebufferError;
use crate::types::Size;

use super::texture::{Handle, Texture};

/// One color output of a framebuffer.
#[derive(Debug, Clone)]
pub(crate) struct Attachment {
    pub(crate) handle: Handle,
    pub(crate) size: Size,
    pub(crate) format: wgpu::TextureFormat,
    pub(crate) view: wgpu::TextureView,
}

impl Attachment {
    pub(crate) fn of(texture: &Texture) -> Self {
        Self {
            handle: texture.handle(),
            size: texture.size(),
            format: texture.format(),
            view: texture.view().clone(),
        }
    }
}

/// Off-screen render target with one or more color attachments.
///
/// A framebuffer is created once per program and re-pointed at a different
/// destination texture for each stage. Attachments capture the texture's
/// current backing store, so re-attach after resizing a texture.
#[derive(Debug, Clone)]
pub struct Framebuffer {
    label: String,
    attachments: Vec<Option<Attachment>>,
}

impl Framebuffer {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            attachments: Vec::new(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Attaches `texture` as color output `slot`, replacing what was there.
    pub fn attach(&mut self, slot: usize, texture: &Texture) -> &mut Self {
        if self.attachments.len() <= slot {
            self.attachments.resize(slot + 1, None);
        }
        self.attachments[slot] = Some(Attachment::of(texture));
        self
    }

    pub fn detach(&mut self, slot: usize) -> &mut Self {
        if let Some(entry) = self.attachments.get_mut(slot) {
            *entry = None;
        }
        while matches!(self.attachments.last(), Some(None)) {
            self.attachments.pop();
        }
        self
    }

    pub fn detach_all(&mut self) -> &mut Self {
        self.attachments.clear();
        self
    }

    pub fn attachment_count(&self) -> usize {
        self.attachments.len()
    }

    pub fn attached(&self, slot: usize) -> Option<Handle> {
        self.attachments
            .get(slot)
            .and_then(|entry| entry.as_ref())
            .map(|attachment| attachment.handle)
    }

    /// Verifies every slot up to the last one is filled and all attachments
    /// share one size, returning that size.
    pub fn check(&self) -> Result<Size, FramebufferError> {
        let mut expected: Option<Size> = None;
        if self.attachments.is_empty() {
            return Err(FramebufferError::Incomplete {
                label: self.label.clone(),
                slot: 0,
            });
        }
        for (slot, entry) in self.attachments.iter().enumerate() {
            let attachment = entry.as_ref().ok_or_else(|| FramebufferError::Incomplete {
                label: self.label.clone(),
                slot,
            })?;
            match expected {
                None => expected = Some(attachment.size),
                Some(size) if size != attachment.size => {
                    return Err(FramebufferError::SizeMismatch {
                        label: self.label.clone(),
                        slot,
                        expected: (size.width, size.height),
                        found: (attachment.size.width, attachment.size.height),
                    });
                }
                Some(_) => {}
            }
        }
        expected.ok_or_else(|| FramebufferError::Incomplete {
            label: self.label.clone(),
            slot: 0,
        })
    }

    /// Attachments of a framebuffer that passed [`Framebuffer::check`].
    pub(crate) fn attachments(&self) -> impl Iterator<Item = &Attachment> {
        self.attachments.iter().flatten()
    }
}
