use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Result};
use renderer::{CommandChannels, Frame, GpuContext, Host, Program, ProgramCatalog, Size, Tick};

fn context() -> Option<GpuContext> {
    match GpuContext::headless() {
        Ok(ctx) => Some(ctx),
        Err(_) => {
            eprintln!("Skipping test: no GPU adapter found");
            None
        }
    }
}

/// Refuses resizes while `refuse` is set and counts every attempt.
struct Stubborn {
    refuse: Arc<AtomicBool>,
    attempts: Arc<AtomicUsize>,
    size: Size,
}

impl Program for Stubborn {
    fn name(&self) -> &str {
        "stubborn"
    }

    fn load(&mut self, _: &GpuContext, size: Size, _: &mut CommandChannels) -> Result<()> {
        self.size = size;
        Ok(())
    }

    fn render(&mut self, _: &mut Frame<'_>, tick: &Tick) -> Result<()> {
        if tick.size != self.size {
            bail!("rendered at {} but resources are {}", tick.size, self.size);
        }
        Ok(())
    }

    fn resize(&mut self, _: &GpuContext, size: Size) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.refuse.load(Ordering::SeqCst) {
            bail!("not now");
        }
        self.size = size;
        Ok(())
    }
}

#[test]
fn failed_program_resize_keeps_host_size() {
    let Some(ctx) = context() else { return };
    let refuse = Arc::new(AtomicBool::new(true));
    let attempts = Arc::new(AtomicUsize::new(0));
    let mut catalog = ProgramCatalog::new();
    {
        let refuse = Arc::clone(&refuse);
        let attempts = Arc::clone(&attempts);
        catalog.register("stubborn", "refuses to resize", move || {
            Box::new(Stubborn {
                refuse: Arc::clone(&refuse),
                attempts: Arc::clone(&attempts),
                size: Size::new(0, 0),
            })
        });
    }

    let original = Size::new(16, 16);
    let mut host = Host::new(ctx, original, catalog).unwrap();
    host.switch_to(0).unwrap();

    let larger = Size::new(32, 24);
    let err = host.resize(larger).unwrap_err();
    assert!(format!("{err:#}").contains("not now"), "{err:#}");
    assert_eq!(host.size(), original);
    assert_eq!(host.screen().size(), original);
    host.tick(Instant::now()).unwrap();

    refuse.store(false, Ordering::SeqCst);
    host.resize(larger).unwrap();
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
    assert_eq!(host.size(), larger);
    assert_eq!(host.screen().size(), larger);
    host.tick(Instant::now()).unwrap();
}
