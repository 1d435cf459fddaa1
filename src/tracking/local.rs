use uuid::Uuid;

use super::{select_fields, TrackingError, TrackingSystem};
use crate::db::Database;
use crate::models::{NewRecord, Record};

impl TrackingSystem for Database {
    fn create_record(&self, record: NewRecord) -> Result<Record, TrackingError> {
        Database::create_record(self, record).map_err(Into::into)
    }

    fn read_fields(
        &self,
        entity_type: &str,
        code: &str,
        fields: &[&str],
    ) -> Result<Option<Record>, TrackingError> {
        let record = self.find_record(entity_type, code)?;
        Ok(record.map(|r| select_fields(r, fields)))
    }

    fn retire_record(&self, entity_type: &str, id: Uuid) -> Result<(), TrackingError> {
        if self.delete_record(entity_type, id)? {
            Ok(())
        } else {
            Err(TrackingError::NotFound(format!("{} {}", entity_type, id)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> Database {
        let db = Database::open_memory().unwrap();
        db.migrate().unwrap();
        db
    }

    #[test]
    fn test_read_fields_keeps_requested_fields() {
        let db = setup();
        TrackingSystem::create_record(
            &db,
            NewRecord::new("Shot", "shot042")
                .field("cut_in", 1001)
                .field("cut_out", 1100)
                .field("status", "ip"),
        )
        .unwrap();

        let record = TrackingSystem::read_fields(&db, "Shot", "shot042", &["cut_in", "cut_out"])
            .unwrap()
            .unwrap();
        assert_eq!(record.get_i64("cut_in"), Some(1001));
        assert_eq!(record.get_i64("cut_out"), Some(1100));
        assert!(!record.fields.contains_key("status"));
    }

    #[test]
    fn test_read_fields_misses_unknown_code() {
        let db = setup();
        let record = TrackingSystem::read_fields(&db, "Shot", "nope", &[]).unwrap();
        assert!(record.is_none());
    }

    #[test]
    fn test_retire_unknown_record_is_not_found() {
        let db = setup();
        let err = TrackingSystem::retire_record(&db, "Shot", Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, TrackingError::NotFound(_)));
    }
}
