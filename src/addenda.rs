//! The Addenda Dispatcher: writes one of the seven addenda variants into
//! the single wide `ach_addendas` table, populating only the columns that
//! variant means something for.

use crate::ach::AddendaRecord;
use rusqlite::{params, Connection};

#[derive(Debug, thiserror::Error)]
pub enum AddendaError {
    #[error(transparent)]
    Sql(#[from] rusqlite::Error),
}

impl crate::ErrorClassification for AddendaError {
    fn is_retryable(&self) -> bool {
        match self {
            AddendaError::Sql(e) => crate::schema::is_retryable_sqlite_error(e),
        }
    }
}

/// Inserts one addenda row under the given entry/batch/file spine.
pub fn insert(
    conn: &Connection,
    file_id: &str,
    batch_id: &str,
    entry_id: &str,
    record: &AddendaRecord,
) -> Result<(), AddendaError> {
    match record {
        AddendaRecord::Addenda02(a) => conn.execute(
            "INSERT INTO ach_addendas
                (entry_id, batch_id, file_id, type_code,
                 terminal_identification_code, terminal_location, terminal_city, terminal_state)
             VALUES (?1, ?2, ?3, '02', ?4, ?5, ?6, ?7)",
            params![
                entry_id,
                batch_id,
                file_id,
                a.terminal_identification_code,
                a.terminal_location,
                a.terminal_city,
                a.terminal_state,
            ],
        ),
        AddendaRecord::Addenda05(a) => conn.execute(
            "INSERT INTO ach_addendas
                (entry_id, batch_id, file_id, type_code, payment_related_information)
             VALUES (?1, ?2, ?3, '05', ?4)",
            params![entry_id, batch_id, file_id, a.payment_related_information],
        ),
        AddendaRecord::Addenda98(a) => conn.execute(
            "INSERT INTO ach_addendas
                (entry_id, batch_id, file_id, type_code,
                 change_code, original_entry_trace_number, original_rdfi_identification, corrected_data)
             VALUES (?1, ?2, ?3, '98', ?4, ?5, ?6, ?7)",
            params![
                entry_id,
                batch_id,
                file_id,
                a.change_code,
                a.original_trace_number,
                a.original_rdfi_identification,
                a.corrected_data,
            ],
        ),
        AddendaRecord::Addenda98Refused(a) => conn.execute(
            "INSERT INTO ach_addendas
                (entry_id, batch_id, file_id, type_code,
                 refused_change_code, refused_original_entry_trace_number,
                 refused_original_rdfi_identification, refused_corrected_data)
             VALUES (?1, ?2, ?3, '98R', ?4, ?5, ?6, ?7)",
            params![
                entry_id,
                batch_id,
                file_id,
                a.refused_change_code,
                a.original_trace_number,
                a.original_rdfi_identification,
                a.corrected_data,
            ],
        ),
        AddendaRecord::Addenda99(a) => conn.execute(
            "INSERT INTO ach_addendas
                (entry_id, batch_id, file_id, type_code,
                 return_code, original_trace_number, date_of_death, original_receiving_dfi_identification)
             VALUES (?1, ?2, ?3, '99', ?4, ?5, ?6, ?7)",
            params![
                entry_id,
                batch_id,
                file_id,
                a.return_reason_code,
                a.original_trace_number,
                a.date_of_death,
                a.original_rdfi_identification,
            ],
        ),
        AddendaRecord::Addenda99Contested(a) => conn.execute(
            "INSERT INTO ach_addendas
                (entry_id, batch_id, file_id, type_code,
                 contested_return_code, original_entry_trace_number_contested,
                 date_original_entry_returned, original_receiving_dfi_identification_contested,
                 original_settlement_date, return_trace_number, return_settlement_date,
                 return_reason_code, dishonored_return_trace_number,
                 dishonored_return_settlement_date, dishonored_return_reason_code,
                 trace_number)
             VALUES (?1, ?2, ?3, '99C', ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                entry_id,
                batch_id,
                file_id,
                a.contested_return_code,
                a.original_entry_trace_number_contested,
                a.date_original_entry_returned,
                a.original_receiving_dfi_identification_contested,
                a.original_settlement_date,
                a.return_trace_number,
                a.return_settlement_date,
                a.return_reason_code,
                a.dishonored_return_trace_number,
                a.dishonored_return_settlement_date,
                a.dishonored_return_reason_code,
                a.trace_number,
            ],
        ),
        AddendaRecord::Addenda99Dishonored(a) => conn.execute(
            "INSERT INTO ach_addendas
                (entry_id, batch_id, file_id, type_code,
                 dishonored_return_code, original_entry_trace_number_dishonored,
                 return_settlement_date_dishonored, original_receiving_dfi_identification_dishonored,
                 return_reason_code, addenda_information, trace_number, line_number)
             VALUES (?1, ?2, ?3, '99D', ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                entry_id,
                batch_id,
                file_id,
                a.dishonored_return_reason_code,
                a.original_entry_trace_number,
                a.original_entry_return_date,
                a.original_receiving_dfi_identification,
                a.return_reason_code,
                a.addenda_information,
                a.trace_number,
                a.line_number,
            ],
        ),
    }?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ach::{Addenda05, Addenda98, Addenda99Contested, Addenda99Dishonored};

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE ach_addendas (
                entry_id TEXT, batch_id TEXT, file_id TEXT, type_code TEXT,
                terminal_identification_code TEXT, terminal_location TEXT, terminal_city TEXT, terminal_state TEXT,
                payment_related_information TEXT,
                change_code TEXT, original_entry_trace_number TEXT, original_rdfi_identification TEXT, corrected_data TEXT,
                refused_change_code TEXT, refused_original_entry_trace_number TEXT,
                refused_original_rdfi_identification TEXT, refused_corrected_data TEXT,
                return_code TEXT, original_trace_number TEXT, date_of_death TEXT, original_receiving_dfi_identification TEXT,
                contested_return_code TEXT, original_entry_trace_number_contested TEXT,
                date_original_entry_returned TEXT, original_receiving_dfi_identification_contested TEXT,
                original_settlement_date TEXT, return_trace_number TEXT, return_settlement_date TEXT,
                return_reason_code TEXT, dishonored_return_trace_number TEXT,
                dishonored_return_settlement_date TEXT, dishonored_return_reason_code TEXT,
                trace_number TEXT,
                dishonored_return_code TEXT, original_entry_trace_number_dishonored TEXT,
                return_settlement_date_dishonored TEXT, original_receiving_dfi_identification_dishonored TEXT,
                addenda_information TEXT, line_number INTEGER
            )",
        )
        .unwrap();
        conn
    }

    #[test]
    fn inserts_addenda05_payment_related_information() {
        let conn = setup();
        let record = AddendaRecord::Addenda05(Addenda05 {
            payment_related_information: "memo line".into(),
        });
        insert(&conn, "file1", "batch1", "entry1", &record).unwrap();

        let value: String = conn
            .query_row(
                "SELECT payment_related_information FROM ach_addendas WHERE entry_id = 'entry1'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(value, "memo line");
    }

    #[test]
    fn inserts_addenda98_corrected_data() {
        let conn = setup();
        let record = AddendaRecord::Addenda98(Addenda98 {
            change_code: "C01".into(),
            corrected_data: "NEW NAME".into(),
            ..Default::default()
        });
        insert(&conn, "file1", "batch1", "entry1", &record).unwrap();

        let (type_code, corrected): (String, String) = conn
            .query_row(
                "SELECT type_code, corrected_data FROM ach_addendas WHERE entry_id = 'entry1'",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(type_code, "98");
        assert_eq!(corrected, "NEW NAME");
    }

    #[test]
    fn inserts_addenda99_contested_full_column_set() {
        let conn = setup();
        let record = AddendaRecord::Addenda99Contested(Addenda99Contested {
            contested_return_code: "68".into(),
            original_entry_trace_number_contested: "121042880000001".into(),
            date_original_entry_returned: "230415".into(),
            original_receiving_dfi_identification_contested: "12104288".into(),
            original_settlement_date: "230410".into(),
            return_trace_number: "121042880000002".into(),
            return_settlement_date: "230416".into(),
            return_reason_code: "R01".into(),
            dishonored_return_trace_number: "121042880000003".into(),
            dishonored_return_settlement_date: "230417".into(),
            dishonored_return_reason_code: "R02".into(),
            trace_number: "121042880000004".into(),
        });
        insert(&conn, "file1", "batch1", "entry1", &record).unwrap();

        let row: (String, String, String, String, String, String, String) = conn
            .query_row(
                "SELECT original_settlement_date, return_trace_number, return_settlement_date,
                        return_reason_code, dishonored_return_trace_number,
                        dishonored_return_settlement_date, dishonored_return_reason_code
                 FROM ach_addendas WHERE entry_id = 'entry1'",
                [],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                        row.get(6)?,
                    ))
                },
            )
            .unwrap();
        assert_eq!(row.0, "230410");
        assert_eq!(row.1, "121042880000002");
        assert_eq!(row.2, "230416");
        assert_eq!(row.3, "R01");
        assert_eq!(row.4, "121042880000003");
        assert_eq!(row.5, "230417");
        assert_eq!(row.6, "R02");
    }

    #[test]
    fn inserts_addenda99_dishonored_full_column_set() {
        let conn = setup();
        let record = AddendaRecord::Addenda99Dishonored(Addenda99Dishonored {
            dishonored_return_reason_code: "R03".into(),
            original_entry_trace_number: "121042880000005".into(),
            original_entry_return_date: "230418".into(),
            original_receiving_dfi_identification: "12104288".into(),
            return_reason_code: "R04".into(),
            addenda_information: "dishonored for insufficient funds".into(),
            trace_number: "121042880000006".into(),
            line_number: 3,
        });
        insert(&conn, "file1", "batch1", "entry1", &record).unwrap();

        let (return_reason_code, line_number): (String, u32) = conn
            .query_row(
                "SELECT return_reason_code, line_number FROM ach_addendas WHERE entry_id = 'entry1'",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(return_reason_code, "R04");
        assert_eq!(line_number, 3);
    }
}
