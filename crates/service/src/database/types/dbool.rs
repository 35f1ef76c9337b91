use sqlx::encode::IsNull;
use sqlx::error::BoxDynError;
use sqlx::sqlite::{SqliteArgumentValue, SqliteTypeInfo, SqliteValueRef};
use sqlx::{Decode, Encode, Sqlite, Type};

/// Flag column holding exactly 0 or 1.
///
/// Anything else in a flag column means the row was written by something
/// other than this crate, so decoding refuses it.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Default)]
pub struct DBool(bool);

#[derive(Debug, thiserror::Error)]
#[error("flag column holds {0}, expected 0 or 1")]
struct InvalidFlag(i64);

impl From<DBool> for bool {
    fn from(flag: DBool) -> Self {
        flag.0
    }
}

impl From<bool> for DBool {
    fn from(flag: bool) -> Self {
        Self(flag)
    }
}

impl Decode<'_, Sqlite> for DBool {
    fn decode(value: SqliteValueRef<'_>) -> Result<Self, BoxDynError> {
        match <i64 as Decode<Sqlite>>::decode(value)? {
            0 => Ok(Self(false)),
            1 => Ok(Self(true)),
            other => Err(Box::new(InvalidFlag(other))),
        }
    }
}

impl Encode<'_, Sqlite> for DBool {
    fn encode_by_ref(
        &self,
        args: &mut Vec<SqliteArgumentValue<'_>>,
    ) -> Result<IsNull, BoxDynError> {
        args.push(SqliteArgumentValue::Int(i32::from(self.0)));
        Ok(IsNull::No)
    }
}

impl Type<Sqlite> for DBool {
    fn compatible(ty: &SqliteTypeInfo) -> bool {
        <i64 as Type<Sqlite>>::compatible(ty)
    }

    fn type_info() -> SqliteTypeInfo {
        <i64 as Type<Sqlite>>::type_info()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use sqlx::{Row, SqlitePool};

    #[tokio::test]
    async fn test_flags_decode_strictly() {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();

        let row = sqlx::query("SELECT ? AS on_flag, ? AS off_flag, 2 AS bad_flag")
            .bind(DBool::from(true))
            .bind(DBool::from(false))
            .fetch_one(&pool)
            .await
            .unwrap();

        assert!(bool::from(row.get::<DBool, _>("on_flag")));
        assert!(!bool::from(row.get::<DBool, _>("off_flag")));
        assert!(row.try_get::<DBool, _>("bad_flag").is_err());
    }
}
