use std::io::Write;

use tabled::builder::Builder;
use tabled::settings::{Alignment, Style};

use crate::portfolio::render::RenderTable;
use crate::util::basic::SError;
use crate::util::rw::WriteHandle;

use super::model::{OutputType, TableWriter};

pub struct TextWriter {
    w: WriteHandle,
}

impl TextWriter {
    pub fn new(w: WriteHandle) -> TextWriter {
        TextWriter { w }
    }
}

impl TableWriter for TextWriter {
    fn print_render_table(
        &mut self,
        out_type: OutputType,
        name: &str,
        table: &RenderTable,
    ) -> Result<(), SError> {
        let title = match out_type {
            OutputType::Transactions => {
                format!("Transactions for {}", name)
            }
            OutputType::AggregateGains => {
                "Aggregate Gains".to_string()
            }
            OutputType::Raw => name.to_string(),
        };

        for err in &table.errors {
            writeln!(self.w, "[!] {}. Printing parsed information state:", err)
                .map_err(|e| e.to_string())?;
        }

        let mut builder = Builder::default();
        builder.push_record(table.header.clone());
        for row in &table.rows {
            builder.push_record(row.clone());
        }
        if !table.footer.is_empty() {
            builder.push_record(table.footer.clone());
        }

        let mut text_table = builder.build();
        text_table.with(Style::ascii()).with(Alignment::left());

        writeln!(self.w, "{}", title).map_err(|e| e.to_string())?;
        writeln!(self.w, "{}", text_table).map_err(|e| e.to_string())?;

        for note in &table.notes {
            writeln!(self.w, "{}", note).map_err(|e| e.to_string())?;
        }
        writeln!(self.w).map_err(|e| e.to_string())?;
        Ok(())
    }
}
