//! Load demographic samples from the census CSV extract

use super::sample::{AttributeValue, DemographicSample};
use crate::error::StoreResult;
use csv::{Reader, StringRecord};
use std::path::Path;

fn to_sample(headers: &StringRecord, record: &StringRecord) -> DemographicSample {
    headers
        .iter()
        .zip(record.iter())
        .filter_map(|(header, cell)| {
            AttributeValue::parse(cell).map(|value| (header.trim().to_string(), value))
        })
        .collect()
}

/// Load all samples from a CSV file with a header row
pub fn load_samples<P: AsRef<Path>>(path: P) -> StoreResult<Vec<DemographicSample>> {
    let reader = Reader::from_path(path)?;
    read_samples(reader)
}

/// Load samples from any reader (e.g., string buffer, network stream)
pub fn load_samples_from_reader<R: std::io::Read>(reader: R) -> StoreResult<Vec<DemographicSample>> {
    read_samples(Reader::from_reader(reader))
}

fn read_samples<R: std::io::Read>(mut reader: Reader<R>) -> StoreResult<Vec<DemographicSample>> {
    let headers = reader.headers()?.clone();
    let mut samples = Vec::new();

    for result in reader.records() {
        let record = result?;
        samples.push(to_sample(&headers, &record));
    }

    log::debug!("Loaded {} demographic samples", samples.len());
    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "alter,weiblich,kanton,bruttojahr,beruf\n\
                       34,1,Zürich,85000,Lehrerin\n\
                       61,0,Bern,,\n\
                       NA,1,Genf,120000,Ärztin\n";

    #[test]
    fn test_load_samples_from_reader() {
        let samples = load_samples_from_reader(CSV.as_bytes()).unwrap();
        assert_eq!(samples.len(), 3);

        assert_eq!(samples[0].number("alter"), Some(34.0));
        assert_eq!(samples[0].text("beruf"), Some("Lehrerin"));
        assert_eq!(samples[0].len(), 5);
    }

    #[test]
    fn test_empty_cells_are_absent() {
        let samples = load_samples_from_reader(CSV.as_bytes()).unwrap();

        assert!(samples[1].get("bruttojahr").is_none());
        assert!(samples[1].get("beruf").is_none());
        assert_eq!(samples[1].len(), 3);
        assert!(samples[2].get("alter").is_none());
    }
}
