pub mod field_as_string;
pub mod u64_from_string_or_number;
