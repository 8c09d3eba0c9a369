use std::path::PathBuf;

use crate::portfolio::render::RenderTable;
use crate::util::basic::SError;

use super::model::{OutputType, TableWriter};

/// Writes each render table as a CSV file in an output directory.
pub struct CsvWriter {
    out_dir: PathBuf,
}

impl CsvWriter {
    pub fn new_to_output_dir(dir_path: &str) -> Result<CsvWriter, SError> {
        let out_dir = PathBuf::from(dir_path);
        std::fs::create_dir_all(&out_dir).map_err(|e| {
            format!("Could not create directory {}: {}", dir_path, e)
        })?;
        Ok(CsvWriter { out_dir })
    }

    fn file_name(out_type: &OutputType, name: &str) -> String {
        match out_type {
            OutputType::Transactions => format!("{}.csv", name),
            OutputType::AggregateGains => "aggregate-gains.csv".to_string(),
            OutputType::Raw => format!("{}.csv", name),
        }
    }
}

impl TableWriter for CsvWriter {
    fn print_render_table(
        &mut self,
        out_type: OutputType,
        name: &str,
        table: &RenderTable,
    ) -> Result<(), SError> {
        let path = self.out_dir.join(Self::file_name(&out_type, name));
        let file = std::fs::File::create(&path)
            .map_err(|e| format!("Could not create {}: {}", path.display(), e))?;
        let mut csv_w = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        for err in &table.errors {
            csv_w
                .write_record([format!("[!] {}", err)])
                .map_err(|e| e.to_string())?;
        }
        csv_w
            .write_record(&table.header)
            .map_err(|e| e.to_string())?;
        for row in &table.rows {
            csv_w.write_record(row).map_err(|e| e.to_string())?;
        }
        if !table.footer.is_empty() {
            csv_w
                .write_record(&table.footer)
                .map_err(|e| e.to_string())?;
        }
        for note in &table.notes {
            csv_w
                .write_record([note.as_str()])
                .map_err(|e| e.to_string())?;
        }
        csv_w.flush().map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use crate::portfolio::render::RenderTable;

    use super::{CsvWriter, OutputType, TableWriter};

    #[test]
    fn test_csv_file_output() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().to_str().unwrap();
        let mut writer = CsvWriter::new_to_output_dir(dir).unwrap();

        let table = RenderTable {
            header: vec!["A".to_string(), "B".to_string()],
            rows: vec![vec!["1".to_string(), "has,comma".to_string()]],
            footer: vec![],
            notes: vec![],
            errors: vec![],
        };
        writer
            .print_render_table(OutputType::Transactions, "FOO", &table)
            .unwrap();

        let written =
            std::fs::read_to_string(tmp.path().join("FOO.csv")).unwrap();
        assert_eq!(written, "A,B\n1,\"has,comma\"\n");
    }
}
