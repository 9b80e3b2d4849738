pub mod accounts;
pub mod pdf;
pub mod spreadsheet;
pub mod storage;
pub mod summary;
pub mod uploads;
