//! Application use cases / business logic

pub mod batch;
pub mod classify;
pub mod onboard;
pub mod render;
pub mod run_loop;

pub use batch::{BatchConfig, BatchOutcome, NotificationBatcher, SendPolicy};
pub use classify::{Assessment, ClassifyConfig, ClassifyUseCase, Tone};
pub use onboard::{OnboardOutcome, OnboardUseCase, StartCommand};
pub use render::{RenderConfig, Renderer};
pub use run_loop::{RunConfig, RunCoordinator, RunError};
