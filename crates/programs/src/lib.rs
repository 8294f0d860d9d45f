//! Program variants for the `renderer` host.
//!
//! Each variant owns a [`renderer::PassPipeline`] holding every texture it
//! samples, compiles its stages from embedded GLSL and finishes every frame
//! with a colorize pass onto the screen:
//!
//! ```text
//! life        life -> growth -> colorize        (cyclic: cyclic -> colorize)
//! smooth-life smooth -> gauss x -> gauss y -> colorize
//! pong        pong -> colorize
//! turtle      turtle -> colorize
//! mandelbrot  mandelbrot -> colorize
//! julia       julia -> colorize
//! live-edit   <file on disk> -> colorize
//! noop        clear
//! ```
//!
//! [`catalog`] builds the ordered set the host switches through.

pub mod common;
pub mod fractal;
pub mod life;
pub mod live_edit;
pub mod noop;
pub mod pong;
pub mod rules;
pub mod smooth;
pub mod turtle;
pub mod vector;

use renderer::ProgramCatalog;

pub use common::Colorizer;
pub use fractal::{FractalKind, FractalProgram, FractalView, PanTarget};
pub use life::{LifeMode, LifeOptions, LifeProgram};
pub use live_edit::{LiveEditOptions, LiveEditProgram, LiveSources, LIVE_FRAGMENT_GLSL, LIVE_VERTEX_GLSL};
pub use noop::NoopProgram;
pub use pong::{Ball, PongProgram, BALL_COUNT};
pub use rules::{RuleError, RuleSet};
pub use smooth::{SmoothLifeProgram, SmoothLifeRules};
pub use turtle::{Turtle, TurtleProgram};
pub use vector::Vector2;

/// Settings the catalog hands to each program it instantiates.
#[derive(Debug, Clone, Default)]
pub struct CatalogOptions {
    pub life: LifeOptions,
    pub smooth_life: SmoothLifeRules,
    /// Seed shared by the randomised programs; random when unset.
    pub seed: Option<u64>,
    /// Files for the live-edit program. It is left out of the catalog when
    /// unset.
    pub live_edit: Option<LiveEditOptions>,
}

/// Every program in switching order.
pub fn catalog(options: &CatalogOptions) -> ProgramCatalog {
    let mut catalog = ProgramCatalog::new();

    let life = LifeOptions {
        seed: options.life.seed.or(options.seed),
        ..options.life.clone()
    };
    let smooth_life = options.smooth_life;
    let seed = options.seed;

    catalog
        .register("life", "Life-like automata with a cyclic mode", move || {
            Box::new(LifeProgram::new(life.clone()))
        })
        .register("smooth-life", "Continuous Life over blurred fillings", move || {
            Box::new(SmoothLifeProgram::new(smooth_life, seed))
        })
        .register("pong", "Bouncing balls leaving trails", move || {
            Box::new(PongProgram::new(seed))
        })
        .register("turtle", "Turtle graphics on a turn schedule", || {
            Box::new(TurtleProgram::new())
        })
        .register("mandelbrot", "Mandelbrot set explorer", || {
            Box::new(FractalProgram::mandelbrot())
        })
        .register("julia", "Julia set explorer", || Box::new(FractalProgram::julia()));

    if let Some(live_edit) = options.live_edit.clone() {
        catalog.register("live-edit", "Shader pair reloaded from disk", move || {
            Box::new(LiveEditProgram::new(live_edit.clone()))
        });
    }
    catalog.register("noop", "Blank screen", || Box::new(NoopProgram));
    catalog
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn names(catalog: &ProgramCatalog) -> Vec<String> {
        catalog.entries().map(|entry| entry.name.clone()).collect()
    }

    #[test]
    fn catalog_lists_programs_in_order() {
        let catalog = catalog(&CatalogOptions::default());
        assert_eq!(
            names(&catalog),
            ["life", "smooth-life", "pong", "turtle", "mandelbrot", "julia", "noop"]
        );
    }

    #[test]
    fn live_edit_joins_catalog_with_paths() {
        let options = CatalogOptions {
            live_edit: Some(LiveEditOptions {
                vertex: PathBuf::from("live.vert"),
                fragment: PathBuf::from("live.frag"),
            }),
            ..CatalogOptions::default()
        };
        let catalog = catalog(&options);
        assert_eq!(catalog.position("live-edit"), Some(6));
        assert_eq!(catalog.len(), 8);
    }
}
