//! Utility functions and helpers

pub mod certificates;

pub use certificates::{
    certificate_info, load_certificate_bundle, read_file_contents, CertificateBundle,
    CertificateInfo,
};
