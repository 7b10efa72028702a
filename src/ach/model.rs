//! The record tree this crate projects into SQL: a `File` containing
//! `Batch`es containing `EntryDetail`s, each optionally followed by one
//! addenda record. Field widths below approximate the NACHA fixed-width
//! layout closely enough to round-trip through [`super::reader`] and to
//! give the Identity Stamper a stable canonical line to hash; they are not
//! a byte-for-byte implementation of the real interbank format, which is
//! deliberately out of scope (see the module-level docs on `super`).

use serde::{Deserialize, Serialize};

/// Left-justifies `value` into a field of `width` characters, truncating if
/// it's too long and space-padding if it's too short. Used for "alpha"
/// fields (names, identifiers that may carry leading zeros or letters).
pub(crate) fn alpha(value: &str, width: usize) -> String {
    let mut s: String = value.chars().take(width).collect();
    while s.chars().count() < width {
        s.push(' ');
    }
    s
}

/// Right-justifies `value` into a field of `width` characters, zero-padding
/// on the left and truncating from the left if too long. Used for numeric
/// fields (amounts, counts, identifiers that sort numerically).
pub(crate) fn numeric(value: &str, width: usize) -> String {
    let digits: String = value.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() >= width {
        digits[digits.len() - width..].to_string()
    } else {
        format!("{}{}", "0".repeat(width - digits.len()), digits)
    }
}

fn numeric_u64(value: u64, width: usize) -> String {
    numeric(&value.to_string(), width)
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct FileHeader {
    pub priority_code: String,
    pub immediate_destination: String,
    pub immediate_origin: String,
    pub file_creation_date: String,
    pub file_creation_time: String,
    pub file_id_modifier: String,
    pub immediate_destination_name: String,
    pub immediate_origin_name: String,
    pub reference_code: String,
}

impl FileHeader {
    /// Canonical 94-character line hashed by the Identity Stamper to derive
    /// a file's content-addressed identifier.
    pub fn to_nacha_line(&self) -> String {
        format!(
            "1{}{}{}{}{}{}094{:0>2}{}{}{}{}",
            alpha(&self.priority_code, 2),
            numeric(&self.immediate_destination, 10),
            numeric(&self.immediate_origin, 10),
            alpha(&self.file_creation_date, 6),
            alpha(&self.file_creation_time, 4),
            alpha(&self.file_id_modifier, 1),
            10,
            alpha("1", 1),
            alpha(&self.immediate_destination_name, 23),
            alpha(&self.immediate_origin_name, 23),
            alpha(&self.reference_code, 8),
        )
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct FileControl {
    pub batch_count: u32,
    pub block_count: u32,
    pub entry_addenda_count: u32,
    pub entry_hash: String,
    pub total_debit_amount: u64,
    pub total_credit_amount: u64,
}

impl FileControl {
    pub fn to_nacha_line(&self) -> String {
        format!(
            "9{}{}{}{}{}{}{}",
            numeric_u64(self.batch_count as u64, 6),
            numeric_u64(self.block_count as u64, 6),
            numeric_u64(self.entry_addenda_count as u64, 8),
            numeric(&self.entry_hash, 10),
            numeric_u64(self.total_debit_amount, 12),
            numeric_u64(self.total_credit_amount, 12),
            alpha("", 39),
        )
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct File {
    pub header: FileHeader,
    pub batches: Vec<Batch>,
    pub control: FileControl,

    /// Populated by the Identity Stamper; empty until then.
    #[serde(default)]
    pub id: String,
}

impl File {
    /// Every record line in document order: the file header, then each
    /// batch (header, entries with their addenda in fixed variant order,
    /// control), then the file control. This is the canonical wire form
    /// the Identity Stamper hashes to derive `file_id` -- hashing the
    /// header alone can't distinguish two files that differ only in their
    /// batches.
    pub fn canonical_wire_lines(&self) -> String {
        let mut lines = vec![self.header.to_nacha_line()];
        for batch in &self.batches {
            lines.push(batch.header.to_nacha_line());
            for (entry_index, entry) in batch.entries.iter().enumerate() {
                lines.push(entry.to_nacha_line());
                let mut addenda: Vec<&AddendaRecord> = entry.addenda.iter().collect();
                addenda.sort_by_key(|record| record.variant_order());
                for (addenda_index, record) in addenda.iter().enumerate() {
                    lines.push(record.to_nacha_line((addenda_index + 1) as u32, (entry_index + 1) as u32));
                }
            }
            lines.push(batch.control.to_nacha_line());
        }
        lines.push(self.control.to_nacha_line());
        lines.join("\n")
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct BatchHeader {
    pub service_class_code: String,
    pub company_name: String,
    pub company_identification: String,
    pub standard_entry_class_code: String,
    pub company_entry_description: String,
    pub company_descriptive_date: String,
    pub effective_entry_date: String,
    pub originator_status_code: String,
    pub odfi_identification: String,
    pub batch_number: u32,
}

impl BatchHeader {
    pub fn to_nacha_line(&self) -> String {
        format!(
            "5{}{}{}{}{}{}{}{}{}{}{}",
            numeric(&self.service_class_code, 3),
            alpha(&self.company_name, 16),
            alpha("", 20),
            alpha(&self.company_identification, 10),
            alpha(&self.standard_entry_class_code, 3),
            alpha(&self.company_entry_description, 10),
            alpha(&self.company_descriptive_date, 6),
            alpha(&self.effective_entry_date, 6),
            alpha("", 3),
            alpha(&self.originator_status_code, 1),
            numeric(&self.odfi_identification, 8),
        ) + &numeric_u64(self.batch_number as u64, 7)
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct BatchControl {
    pub service_class_code: String,
    pub entry_addenda_count: u32,
    pub entry_hash: String,
    pub total_debit_amount: u64,
    pub total_credit_amount: u64,
    pub company_identification: String,
    pub odfi_identification: String,
    pub batch_number: u32,
}

impl BatchControl {
    pub fn to_nacha_line(&self) -> String {
        format!(
            "8{}{}{}{}{}{}{}{}{}",
            numeric(&self.service_class_code, 3),
            numeric_u64(self.entry_addenda_count as u64, 6),
            numeric(&self.entry_hash, 10),
            numeric_u64(self.total_debit_amount, 12),
            numeric_u64(self.total_credit_amount, 12),
            alpha(&self.company_identification, 10),
            alpha("", 19),
            alpha("", 6),
            numeric(&self.odfi_identification, 8),
        ) + &numeric_u64(self.batch_number as u64, 7)
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Batch {
    pub header: BatchHeader,
    pub entries: Vec<EntryDetail>,
    pub control: BatchControl,

    #[serde(default)]
    pub id: String,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct EntryDetail {
    pub transaction_code: String,
    pub rdfi_identification: String,
    pub check_digit: String,
    pub dfi_account_number: String,
    pub amount: u64,
    pub individual_identification_number: String,
    pub individual_name: String,
    pub discretionary_data: String,
    pub trace_number: String,

    #[serde(default)]
    pub addenda: Vec<AddendaRecord>,

    #[serde(default)]
    pub id: String,
}

impl EntryDetail {
    pub fn to_nacha_line(&self) -> String {
        let addenda_indicator = if self.addenda.is_empty() { "0" } else { "1" };
        format!(
            "6{}{}{}{}{}{}{}{}{}{}",
            alpha(&self.transaction_code, 2),
            numeric(&self.rdfi_identification, 8),
            alpha(&self.check_digit, 1),
            alpha(&self.dfi_account_number, 17),
            numeric_u64(self.amount, 10),
            alpha(&self.individual_identification_number, 15),
            alpha(&self.individual_name, 22),
            alpha(&self.discretionary_data, 2),
            addenda_indicator,
            numeric(&self.trace_number, 15),
        )
    }
}

/// One of the seven addenda layouts this crate understands. Each variant
/// maps to its own table per the Addenda Dispatcher (see `crate::addenda`).
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "type_code")]
pub enum AddendaRecord {
    #[serde(rename = "02")]
    Addenda02(Addenda02),
    #[serde(rename = "05")]
    Addenda05(Addenda05),
    #[serde(rename = "98")]
    Addenda98(Addenda98),
    #[serde(rename = "98R")]
    Addenda98Refused(Addenda98Refused),
    #[serde(rename = "99")]
    Addenda99(Addenda99),
    #[serde(rename = "99C")]
    Addenda99Contested(Addenda99Contested),
    #[serde(rename = "99D")]
    Addenda99Dishonored(Addenda99Dishonored),
}

impl AddendaRecord {
    /// The two-or-three character type code used both on the wire and as
    /// the discriminant for the Addenda Dispatcher.
    pub fn type_code(&self) -> &'static str {
        match self {
            AddendaRecord::Addenda02(_) => "02",
            AddendaRecord::Addenda05(_) => "05",
            AddendaRecord::Addenda98(_) => "98",
            AddendaRecord::Addenda98Refused(_) => "98R",
            AddendaRecord::Addenda99(_) => "99",
            AddendaRecord::Addenda99Contested(_) => "99C",
            AddendaRecord::Addenda99Dishonored(_) => "99D",
        }
    }

    /// Fixed insertion/canonicalization order for an entry's addenda: 02,
    /// 05, 98, 98R, 99, 99C, 99D.
    pub fn variant_order(&self) -> u8 {
        match self {
            AddendaRecord::Addenda02(_) => 0,
            AddendaRecord::Addenda05(_) => 1,
            AddendaRecord::Addenda98(_) => 2,
            AddendaRecord::Addenda98Refused(_) => 3,
            AddendaRecord::Addenda99(_) => 4,
            AddendaRecord::Addenda99Contested(_) => 5,
            AddendaRecord::Addenda99Dishonored(_) => 6,
        }
    }

    pub fn to_nacha_line(&self, addenda_sequence_number: u32, entry_detail_sequence_number: u32) -> String {
        let payload = match self {
            AddendaRecord::Addenda02(a) => a.payload(),
            AddendaRecord::Addenda05(a) => a.payload(),
            AddendaRecord::Addenda98(a) => a.payload(),
            AddendaRecord::Addenda98Refused(a) => a.payload(),
            AddendaRecord::Addenda99(a) => a.payload(),
            AddendaRecord::Addenda99Contested(a) => a.payload(),
            AddendaRecord::Addenda99Dishonored(a) => a.payload(),
        };
        format!(
            "7{}{}{}{}",
            alpha(self.type_code(), 2),
            alpha(&payload, 80),
            numeric_u64(addenda_sequence_number as u64, 4),
            numeric_u64(entry_detail_sequence_number as u64, 7),
        )
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Addenda02 {
    pub reference_information_one: String,
    pub reference_information_two: String,
    pub terminal_identification_code: String,
    pub transaction_serial_number: String,
    pub transaction_date: String,
    pub terminal_location: String,
    pub terminal_city: String,
    pub terminal_state: String,
}

impl Addenda02 {
    fn payload(&self) -> String {
        format!(
            "{}{}{}{}{}{}{}{}",
            alpha(&self.reference_information_one, 7),
            alpha(&self.reference_information_two, 3),
            alpha(&self.terminal_identification_code, 6),
            alpha(&self.transaction_serial_number, 6),
            alpha(&self.transaction_date, 4),
            alpha(&self.terminal_location, 27),
            alpha(&self.terminal_city, 15),
            alpha(&self.terminal_state, 2),
        )
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Addenda05 {
    pub payment_related_information: String,
}

impl Addenda05 {
    fn payload(&self) -> String {
        alpha(&self.payment_related_information, 80)
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Addenda98 {
    pub change_code: String,
    pub original_trace_number: String,
    pub original_rdfi_identification: String,
    pub corrected_data: String,
    pub trace_number: String,
}

impl Addenda98 {
    fn payload(&self) -> String {
        format!(
            "{}{}{}{}",
            alpha(&self.change_code, 3),
            numeric(&self.original_trace_number, 15),
            numeric(&self.original_rdfi_identification, 8),
            alpha(&self.corrected_data, 29),
        )
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Addenda98Refused {
    pub change_code: String,
    pub original_trace_number: String,
    pub original_rdfi_identification: String,
    pub corrected_data: String,
    pub trace_number: String,
    pub refused_change_code: String,
}

impl Addenda98Refused {
    fn payload(&self) -> String {
        format!(
            "{}{}{}{}{}",
            alpha(&self.change_code, 3),
            numeric(&self.original_trace_number, 15),
            numeric(&self.original_rdfi_identification, 8),
            alpha(&self.corrected_data, 29),
            alpha(&self.refused_change_code, 3),
        )
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Addenda99 {
    pub return_reason_code: String,
    pub original_trace_number: String,
    pub date_of_death: String,
    pub original_rdfi_identification: String,
    pub addenda_information: String,
    pub trace_number: String,
}

impl Addenda99 {
    fn payload(&self) -> String {
        format!(
            "{}{}{}{}{}",
            alpha(&self.return_reason_code, 3),
            numeric(&self.original_trace_number, 15),
            alpha(&self.date_of_death, 6),
            numeric(&self.original_rdfi_identification, 8),
            alpha(&self.addenda_information, 44),
        )
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Addenda99Contested {
    pub contested_return_code: String,
    pub original_entry_trace_number_contested: String,
    pub date_original_entry_returned: String,
    pub original_receiving_dfi_identification_contested: String,
    pub original_settlement_date: String,
    pub return_trace_number: String,
    pub return_settlement_date: String,
    pub return_reason_code: String,
    pub dishonored_return_trace_number: String,
    pub dishonored_return_settlement_date: String,
    pub dishonored_return_reason_code: String,
    pub trace_number: String,
}

impl Addenda99Contested {
    fn payload(&self) -> String {
        format!(
            "{}{}{}{}{}{}{}{}{}{}{}",
            numeric(&self.contested_return_code, 2),
            numeric(&self.original_entry_trace_number_contested, 15),
            alpha(&self.date_original_entry_returned, 6),
            numeric(&self.original_receiving_dfi_identification_contested, 8),
            alpha(&self.original_settlement_date, 6),
            numeric(&self.return_trace_number, 15),
            alpha(&self.return_settlement_date, 6),
            numeric(&self.return_reason_code, 2),
            numeric(&self.dishonored_return_trace_number, 8),
            alpha(&self.dishonored_return_settlement_date, 6),
            numeric(&self.dishonored_return_reason_code, 2),
        )
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Addenda99Dishonored {
    pub dishonored_return_reason_code: String,
    pub original_entry_trace_number: String,
    pub original_entry_return_date: String,
    pub original_receiving_dfi_identification: String,
    pub return_reason_code: String,
    pub addenda_information: String,
    pub trace_number: String,
    pub line_number: u32,
}

impl Addenda99Dishonored {
    fn payload(&self) -> String {
        format!(
            "{}{}{}{}{}{}",
            alpha(&self.dishonored_return_reason_code, 2),
            numeric(&self.original_entry_trace_number, 15),
            alpha(&self.original_entry_return_date, 6),
            numeric(&self.original_receiving_dfi_identification, 8),
            numeric(&self.return_reason_code, 2),
            alpha(&self.addenda_information, 41),
        )
    }
}
