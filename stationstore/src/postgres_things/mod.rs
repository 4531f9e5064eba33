pub mod ddl;
pub mod type_conversion;
