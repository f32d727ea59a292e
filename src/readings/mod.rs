mod service;

pub use service::{
    format_timestamp, QueryOutcome, ReadingList, ReadingQuery, ReadingRow, ReadingService,
    SortOrder, NO_READINGS,
};
