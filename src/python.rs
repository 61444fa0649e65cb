//! Python bindings for the AIR decoder

use pyo3::exceptions::{PyIOError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::PyDict;

use crate::arch::{ArchFrontend, Frontend};
use crate::format::OutputFormat;
use crate::{disasm_with, Architecture, DecodeOptions};

/// Disassemble raw machine code and return it in the requested format
#[pyfunction]
#[pyo3(signature = (code, arch="x86-64", output_format="text", base_address=0))]
fn disassemble(code: Vec<u8>, arch: &str, output_format: &str, base_address: u64) -> PyResult<String> {
    let arch: Architecture = arch.parse().map_err(PyValueError::new_err)?;
    let output_format: OutputFormat = output_format.parse().map_err(PyValueError::new_err)?;

    let frontend = Frontend::for_architecture(arch)
        .ok_or_else(|| PyValueError::new_err(format!("Unsupported architecture: {}", arch)))?;

    let disassembly = disasm_with(&code, arch, &DecodeOptions::default())
        .map_err(|e| PyValueError::new_err(format!("Disassembly failed: {}", e)))?;

    output_format
        .get_formatter(frontend.names())
        .format(&disassembly, &code, base_address)
        .map_err(|e| PyValueError::new_err(format!("Failed to format output: {}", e)))
}

/// Disassemble a flat code file
#[pyfunction]
#[pyo3(signature = (file_path, arch="x86-64", output_format="text", base_address=0))]
fn disassemble_file(file_path: &str, arch: &str, output_format: &str, base_address: u64) -> PyResult<String> {
    let code = std::fs::read(file_path)
        .map_err(|e| PyIOError::new_err(format!("Failed to read file {}: {}", file_path, e)))?;
    disassemble(code, arch, output_format, base_address)
}

/// Python module initialization
#[pymodule]
fn air_disasm(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(disassemble, m)?)?;
    m.add_function(wrap_pyfunction!(disassemble_file, m)?)?;

    let output_format = PyDict::new(m.py());
    for format in OutputFormat::available_formats() {
        let name = format.to_string();
        output_format.set_item(name.to_uppercase(), name)?;
    }
    m.setattr("OutputFormat", output_format)?;

    Ok(())
}
