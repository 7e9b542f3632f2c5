pub mod date;
pub mod record;

pub use record::{normalize, normalize_at, PriceRecord, RawRow, RAW_ROW_ARITY, SOURCE_NAME};
