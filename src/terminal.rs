mod bullet_points;
mod prompt;

pub use bullet_points::{BulletPointPrinter, LineWriter, ProgressBarLineWriter, StdoutLineWriter};
pub use prompt::{confirm, input};
