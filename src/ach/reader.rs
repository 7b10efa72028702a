//! Parses a byte stream into a [`super::File`]. Two wire formats are
//! accepted: fixed-width NACHA-style text (one 94-character record per
//! line) and a JSON encoding of the same tree. Which one a given input
//! uses is sniffed from its first non-whitespace byte, mirroring how the
//! File Source Aggregator hands this crate whatever bytes a backend
//! returned without caring about their origin.

use super::model::{
    Addenda02, Addenda05, Addenda98, Addenda99, AddendaRecord, Batch, BatchControl, BatchHeader,
    EntryDetail, File, FileControl, FileHeader,
};
use super::AchError;

fn field(line: &str, start: usize, len: usize) -> &str {
    let end = (start + len).min(line.len());
    if start >= line.len() {
        ""
    } else {
        &line[start..end]
    }
}

fn trimmed(line: &str, start: usize, len: usize) -> String {
    field(line, start, len).trim().to_string()
}

pub fn parse(bytes: &[u8]) -> Result<File, AchError> {
    let text = std::str::from_utf8(bytes).map_err(|e| AchError::Malformed(e.to_string()))?;
    let first_non_ws = text.chars().find(|c| !c.is_whitespace());
    match first_non_ws {
        Some('{') => parse_json(text),
        Some(_) => parse_nacha(text),
        None => Err(AchError::Malformed("empty input".into())),
    }
}

fn parse_json(text: &str) -> Result<File, AchError> {
    serde_json::from_str(text).map_err(|e| AchError::Malformed(format!("invalid json: {}", e)))
}

fn parse_nacha(text: &str) -> Result<File, AchError> {
    let mut header: Option<FileHeader> = None;
    let mut control: Option<FileControl> = None;
    let mut batches: Vec<Batch> = Vec::new();
    let mut current_batch: Option<Batch> = None;

    for raw_line in text.lines() {
        let line = raw_line.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            continue;
        }
        let record_type = line.chars().next().ok_or_else(|| {
            AchError::Malformed("encountered a record line with no content".into())
        })?;

        match record_type {
            '1' => {
                header = Some(FileHeader {
                    priority_code: trimmed(line, 1, 2),
                    immediate_destination: trimmed(line, 3, 10),
                    immediate_origin: trimmed(line, 13, 10),
                    file_creation_date: trimmed(line, 23, 6),
                    file_creation_time: trimmed(line, 29, 4),
                    file_id_modifier: trimmed(line, 33, 1),
                    immediate_destination_name: trimmed(line, 40, 23),
                    immediate_origin_name: trimmed(line, 63, 23),
                    reference_code: trimmed(line, 86, 8),
                });
            }
            '9' => {
                control = Some(FileControl {
                    batch_count: trimmed(line, 1, 6).parse().unwrap_or(0),
                    block_count: trimmed(line, 7, 6).parse().unwrap_or(0),
                    entry_addenda_count: trimmed(line, 13, 8).parse().unwrap_or(0),
                    entry_hash: trimmed(line, 21, 10),
                    total_debit_amount: trimmed(line, 31, 12).parse().unwrap_or(0),
                    total_credit_amount: trimmed(line, 43, 12).parse().unwrap_or(0),
                });
            }
            '5' => {
                if current_batch.is_some() {
                    return Err(AchError::Malformed(
                        "batch header encountered before prior batch was closed".into(),
                    ));
                }
                current_batch = Some(Batch {
                    header: BatchHeader {
                        service_class_code: trimmed(line, 1, 3),
                        company_name: trimmed(line, 4, 16),
                        company_identification: trimmed(line, 40, 10),
                        standard_entry_class_code: trimmed(line, 50, 3),
                        company_entry_description: trimmed(line, 53, 10),
                        company_descriptive_date: trimmed(line, 63, 6),
                        effective_entry_date: trimmed(line, 69, 6),
                        originator_status_code: trimmed(line, 78, 1),
                        odfi_identification: trimmed(line, 79, 8),
                        batch_number: trimmed(line, 87, 7).parse().unwrap_or(0),
                    },
                    entries: Vec::new(),
                    control: BatchControl::default(),
                    id: String::new(),
                });
            }
            '6' => {
                let batch = current_batch.as_mut().ok_or_else(|| {
                    AchError::Malformed("entry detail encountered outside a batch".into())
                })?;
                let addenda_indicator = field(line, 78, 1);
                batch.entries.push(EntryDetail {
                    transaction_code: trimmed(line, 1, 2),
                    rdfi_identification: trimmed(line, 3, 8),
                    check_digit: trimmed(line, 11, 1),
                    dfi_account_number: trimmed(line, 12, 17),
                    amount: trimmed(line, 29, 10).parse().unwrap_or(0),
                    individual_identification_number: trimmed(line, 39, 15),
                    individual_name: trimmed(line, 54, 22),
                    discretionary_data: trimmed(line, 76, 2),
                    trace_number: trimmed(line, 79, 15),
                    addenda: Vec::new(),
                    id: String::new(),
                });
                let _ = addenda_indicator;
            }
            '7' => {
                let batch = current_batch.as_mut().ok_or_else(|| {
                    AchError::Malformed("addenda encountered outside a batch".into())
                })?;
                let entry = batch.entries.last_mut().ok_or_else(|| {
                    AchError::Malformed("addenda encountered before any entry detail".into())
                })?;
                let type_code = trimmed(line, 1, 2);
                let payload = field(line, 3, 80);
                let record = match type_code.as_str() {
                    "02" => AddendaRecord::Addenda02(Addenda02 {
                        reference_information_one: trimmed(payload, 0, 7),
                        reference_information_two: trimmed(payload, 7, 3),
                        terminal_identification_code: trimmed(payload, 10, 6),
                        transaction_serial_number: trimmed(payload, 16, 6),
                        transaction_date: trimmed(payload, 22, 4),
                        terminal_location: trimmed(payload, 26, 27),
                        terminal_city: trimmed(payload, 53, 15),
                        terminal_state: trimmed(payload, 68, 2),
                    }),
                    "98" => AddendaRecord::Addenda98(Addenda98 {
                        change_code: trimmed(payload, 0, 3),
                        original_trace_number: trimmed(payload, 3, 15),
                        original_rdfi_identification: trimmed(payload, 18, 8),
                        corrected_data: trimmed(payload, 26, 29),
                        trace_number: trimmed(line, 86, 8),
                    }),
                    "99" => AddendaRecord::Addenda99(Addenda99 {
                        return_reason_code: trimmed(payload, 0, 3),
                        original_trace_number: trimmed(payload, 3, 15),
                        date_of_death: trimmed(payload, 18, 6),
                        original_rdfi_identification: trimmed(payload, 24, 8),
                        addenda_information: trimmed(payload, 32, 44),
                        trace_number: trimmed(line, 86, 8),
                    }),
                    "05" => AddendaRecord::Addenda05(Addenda05 {
                        payment_related_information: payload.trim_end().to_string(),
                    }),
                    other => {
                        return Err(AchError::Malformed(format!(
                            "unsupported addenda type '{}'",
                            other
                        )))
                    }
                };
                entry.addenda.push(record);
            }
            '8' => {
                let mut batch = current_batch.take().ok_or_else(|| {
                    AchError::Malformed("batch control encountered without an open batch".into())
                })?;
                batch.control = BatchControl {
                    service_class_code: trimmed(line, 1, 3),
                    entry_addenda_count: trimmed(line, 4, 6).parse().unwrap_or(0),
                    entry_hash: trimmed(line, 10, 10),
                    total_debit_amount: trimmed(line, 20, 12).parse().unwrap_or(0),
                    total_credit_amount: trimmed(line, 32, 12).parse().unwrap_or(0),
                    company_identification: trimmed(line, 44, 10),
                    odfi_identification: trimmed(line, 79, 8),
                    batch_number: trimmed(line, 87, 7).parse().unwrap_or(0),
                };
                batches.push(batch);
            }
            other => {
                return Err(AchError::Malformed(format!(
                    "unrecognized record type code '{}'",
                    other
                )));
            }
        }
    }

    Ok(File {
        header: header.ok_or_else(|| AchError::Malformed("missing file header".into()))?,
        batches,
        control: control.ok_or_else(|| AchError::Malformed("missing file control".into()))?,
        id: String::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_lines() -> String {
        let header = FileHeader {
            priority_code: "01".into(),
            immediate_destination: "0123456789".into(),
            immediate_origin: "9876543210".into(),
            file_creation_date: "230401".into(),
            file_creation_time: "0830".into(),
            file_id_modifier: "A".into(),
            immediate_destination_name: "SOME BANK".into(),
            immediate_origin_name: "SOME COMPANY".into(),
            reference_code: "".into(),
        };
        let batch_header = BatchHeader {
            service_class_code: "200".into(),
            company_name: "ACME CORP".into(),
            company_identification: "1234567890".into(),
            standard_entry_class_code: "PPD".into(),
            company_entry_description: "PAYROLL".into(),
            company_descriptive_date: "230401".into(),
            effective_entry_date: "230402".into(),
            originator_status_code: "1".into(),
            odfi_identification: "12345678".into(),
            batch_number: 1,
        };
        let entry = EntryDetail {
            transaction_code: "22".into(),
            rdfi_identification: "12345678".into(),
            check_digit: "9".into(),
            dfi_account_number: "000111222".into(),
            amount: 150000,
            individual_identification_number: "EMP001".into(),
            individual_name: "JANE DOE".into(),
            discretionary_data: "".into(),
            trace_number: "123456780000001".into(),
            addenda: Vec::new(),
            id: String::new(),
        };
        let batch_control = BatchControl {
            service_class_code: "200".into(),
            entry_addenda_count: 1,
            entry_hash: "12345678".into(),
            total_debit_amount: 0,
            total_credit_amount: 150000,
            company_identification: "1234567890".into(),
            odfi_identification: "12345678".into(),
            batch_number: 1,
        };
        let file_control = FileControl {
            batch_count: 1,
            block_count: 1,
            entry_addenda_count: 1,
            entry_hash: "12345678".into(),
            total_debit_amount: 0,
            total_credit_amount: 150000,
        };

        [
            header.to_nacha_line(),
            batch_header.to_nacha_line(),
            entry.to_nacha_line(),
            batch_control.to_nacha_line(),
            file_control.to_nacha_line(),
        ]
        .join("\n")
    }

    #[test]
    fn round_trips_a_simple_file() {
        let text = sample_lines();
        let file = parse(text.as_bytes()).unwrap();
        assert_eq!(file.header.immediate_origin, "9876543210");
        assert_eq!(file.batches.len(), 1);
        assert_eq!(file.batches[0].entries.len(), 1);
        assert_eq!(file.batches[0].entries[0].amount, 150000);
        assert_eq!(file.control.total_credit_amount, 150000);
    }

    #[test]
    fn rejects_entry_detail_without_a_batch() {
        let line = EntryDetail {
            transaction_code: "22".into(),
            rdfi_identification: "1".into(),
            check_digit: "1".into(),
            dfi_account_number: "1".into(),
            amount: 1,
            individual_identification_number: "1".into(),
            individual_name: "A".into(),
            discretionary_data: "".into(),
            trace_number: "1".into(),
            addenda: Vec::new(),
            id: String::new(),
        }
        .to_nacha_line();
        assert!(parse(line.as_bytes()).is_err());
    }

    #[test]
    fn rejects_unsupported_addenda_type_code() {
        let mut text = sample_lines_ending_before_controls();
        let bogus_addenda = format!("7{}{}{:0>4}{:0>7}", "77", " ".repeat(80), 1, 1);
        text.push('\n');
        text.push_str(&bogus_addenda);
        let err = parse(text.as_bytes()).unwrap_err();
        assert!(matches!(err, AchError::Malformed(msg) if msg.contains("unsupported addenda type")));
    }

    fn sample_lines_ending_before_controls() -> String {
        let header = FileHeader::default();
        let batch_header = BatchHeader::default();
        let entry = EntryDetail::default();
        [
            header.to_nacha_line(),
            batch_header.to_nacha_line(),
            entry.to_nacha_line(),
        ]
        .join("\n")
    }

    #[test]
    fn parses_json_encoded_files() {
        let file = File::default();
        let json = serde_json::to_string(&file).unwrap();
        let parsed = parse(json.as_bytes()).unwrap();
        assert_eq!(parsed, file);
    }
}
