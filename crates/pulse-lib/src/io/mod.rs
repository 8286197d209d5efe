pub mod dataset;
pub mod synthetic;
pub mod text;

pub use dataset::{
    parse_csv_dataset, parse_json_dataset, read_csv_dataset, read_dataset, read_json_dataset,
    write_csv_dataset, Dataset, DatasetError, MAX_PATIENTS,
};
pub use synthetic::{synthetic_dataset, synthetic_patient, Abnormality};
pub use text::{parse_f64_series, read_f64_series};
