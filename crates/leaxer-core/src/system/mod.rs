//! System information module.
//!
//! Provides the GPU snapshot types reported to the front end and the parsers
//! for vendor tool output.

mod gpu;

pub use gpu::{
    parse_name_memory_lines, parse_rocm_csv, GpuDevice, GpuInfo, GpuVendor, VendorGpuInfo,
};
