//! The Field Masker. Plays the role of an external masking library -- no
//! crate in this ecosystem covers ACH-specific field redaction, so the
//! policy is implemented in-crate, but kept behind the single [`apply`]
//! entry point so it could be swapped out without touching callers.

use crate::ach::File;

#[derive(Clone, Copy, Debug, Default, serde::Deserialize, serde::Serialize, PartialEq, Eq)]
pub struct MaskingOptions {
    #[serde(default)]
    pub mask_account_numbers: bool,
    #[serde(default)]
    pub mask_names: bool,
    #[serde(default)]
    pub mask_corrected_data: bool,
    /// When set, amounts are additionally rendered through
    /// [`pretty_amount`] wherever a display-facing representation is
    /// needed; the underlying integer cents value stored in the schema is
    /// unaffected.
    #[serde(default)]
    pub pretty_amounts: bool,
}

/// Masks `file` in place according to `options`. Must run before the
/// Identity Stamper finalizes `file.id`, so masked and unmasked ingests of
/// the same raw bytes land as distinct rows.
pub fn apply(file: &mut File, options: &MaskingOptions) {
    if options.mask_names {
        mask_in_place(&mut file.header.immediate_origin_name);
        mask_in_place(&mut file.header.immediate_destination_name);
    }

    for batch in &mut file.batches {
        if options.mask_names {
            mask_in_place(&mut batch.header.company_name);
        }

        for entry in &mut batch.entries {
            if options.mask_names {
                mask_in_place(&mut entry.individual_name);
            }
            if options.mask_account_numbers {
                entry.dfi_account_number = mask_account_number(&entry.dfi_account_number);
            }
            if options.mask_corrected_data {
                mask_corrected_data(entry);
            }
        }
    }
}

/// Replaces every character but the first with `*`.
fn mask_in_place(value: &mut String) {
    if value.trim().is_empty() {
        return;
    }
    let mut chars = value.chars();
    let first = chars.next().unwrap_or(' ');
    *value = format!("{}{}", first, "*".repeat(value.chars().count().saturating_sub(1)));
}

/// Keeps the last 4 digits of an account number and replaces the rest with
/// `X`, the same convention a bank statement uses.
fn mask_account_number(value: &str) -> String {
    let digits: Vec<char> = value.chars().collect();
    if digits.len() <= 4 {
        return "X".repeat(digits.len());
    }
    let visible: String = digits[digits.len() - 4..].iter().collect();
    format!("{}{}", "X".repeat(digits.len() - 4), visible)
}

fn mask_corrected_data(entry: &mut crate::ach::EntryDetail) {
    for addenda in &mut entry.addenda {
        match addenda {
            crate::ach::AddendaRecord::Addenda98(a) => mask_in_place(&mut a.corrected_data),
            crate::ach::AddendaRecord::Addenda98Refused(a) => mask_in_place(&mut a.corrected_data),
            _ => {}
        }
    }
}

/// Renders a cents amount as a decimal string, e.g. `150000` -> `"1500.00"`.
/// Used by the Results Model and CLI output when `pretty_amounts` is set.
pub fn pretty_amount(cents: u64) -> String {
    format!("{}.{:02}", cents / 100, cents % 100)
}
