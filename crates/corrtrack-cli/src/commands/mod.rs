pub mod export_tiff;
pub mod info;
pub mod test_correlation;
pub mod track;
