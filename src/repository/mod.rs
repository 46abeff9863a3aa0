pub mod row;
pub mod sheet_repository;
