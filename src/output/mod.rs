mod presenter;
mod progress;
mod styling;

pub use presenter::{ConsolePresenter, Presenter};
pub use styling::dim;

use styling::magenta_bold;

#[cfg(test)]
pub use presenter::testing;

/// Prints the `pipeline-lens` banner to stderr.
pub fn print_banner() {
    eprintln!(
        r"
{} {}
  {}
",
        magenta_bold("🔭 pipeline-lens"),
        dim(env!("CARGO_PKG_VERSION")),
        dim("CodePipeline execution tracer")
    );
}
