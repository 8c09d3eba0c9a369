use crate::portfolio::render::RenderTable;
use crate::util::basic::SError;

pub enum OutputType {
    Transactions,
    AggregateGains,
    Raw,
}

/// A sink for render tables: the console, a CSV directory, or a test buffer.
pub trait TableWriter {
    fn print_render_table(
        &mut self,
        out_type: OutputType,
        name: &str,
        table: &RenderTable,
    ) -> Result<(), SError>;
}
