// String formatting intentionally uses format! for clarity
#![allow(clippy::format_push_string)]

use addr2line::Context;
use anyhow::{Context as _, Result};
use gimli::{EndianRcSlice, RunTimeEndian};
use object::{Object, ObjectSection, ObjectSymbol};
use rustc_demangle::demangle;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::rc::Rc;

use crate::domain::ControlError;

/// A function entry from the ELF symbol table
#[derive(Debug, Clone)]
struct FunctionSymbol {
    name: String,
    address: u64,
    size: u64,
}

/// Resolver for the two address translations a run needs: planting
/// breakpoints (name to entry address, via the ELF symbol table) and
/// labeling callers (address to function name, via DWARF).
///
/// Caches resolved labels so repeated hits of the same call site do not
/// re-walk the debug info.
pub struct SymbolResolver {
    functions: Vec<FunctionSymbol>,
    ctx: Context<EndianRcSlice<RunTimeEndian>>,
    position_independent: bool,
    /// Cache of resolved labels by file-relative address
    cache: RefCell<HashMap<u64, String>>,
}

impl SymbolResolver {
    /// Load the symbol table and DWARF debug info of a binary.
    ///
    /// # Errors
    /// Returns [`ControlError::Load`] if the file cannot be read or is not a
    /// parseable ELF image.
    pub fn load<P: AsRef<Path>>(binary_path: P) -> Result<Self> {
        let path = binary_path.as_ref();
        let binary_data = fs::read(path).map_err(|e| ControlError::Load {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let obj_file = object::File::parse(&*binary_data).map_err(|e| ControlError::Load {
            path: path.to_path_buf(),
            reason: format!("not a debuggable executable image: {e}"),
        })?;

        let position_independent = matches!(obj_file.kind(), object::ObjectKind::Dynamic);

        // Copy the function symbols out so the resolver owns its data.
        let mut functions = Vec::new();
        for sym in obj_file.symbols().chain(obj_file.dynamic_symbols()) {
            if sym.kind() != object::SymbolKind::Text || !sym.is_definition() {
                continue;
            }
            if let Ok(name) = sym.name() {
                functions.push(FunctionSymbol {
                    name: name.to_string(),
                    address: sym.address(),
                    size: sym.size(),
                });
            }
        }

        // Load DWARF debug info for caller labeling
        let endian =
            if obj_file.is_little_endian() { RunTimeEndian::Little } else { RunTimeEndian::Big };

        let load_section =
            |id: gimli::SectionId| -> Result<EndianRcSlice<RunTimeEndian>, gimli::Error> {
                let data = obj_file
                    .section_by_name(id.name())
                    .and_then(|section| section.uncompressed_data().ok())
                    .unwrap_or(std::borrow::Cow::Borrowed(&[][..]));
                Ok(EndianRcSlice::new(Rc::from(&*data), endian))
            };

        let dwarf = gimli::Dwarf::load(&load_section)?;
        let ctx = Context::from_dwarf(dwarf).context("Failed to load DWARF debug information")?;

        Ok(Self { functions, ctx, position_independent, cache: RefCell::new(HashMap::new()) })
    }

    /// Whether the image is position independent (needs a runtime load bias).
    #[must_use]
    pub fn is_position_independent(&self) -> bool {
        self.position_independent
    }

    /// Whether the image carries any function symbols at all.
    #[must_use]
    pub fn has_function_symbols(&self) -> bool {
        !self.functions.is_empty()
    }

    /// Look up the file-relative entry address of a function by name.
    ///
    /// Matches the raw symbol name first, then the demangled form, so both
    /// `coap2oscore` (C) and `fixture::scribble` (Rust) style names work.
    ///
    /// # Errors
    /// Returns [`ControlError::SymbolNotFound`] if no symbol matches.
    pub fn function_address(&self, name: &str) -> Result<u64, ControlError> {
        if let Some(sym) = self.functions.iter().find(|s| s.name == name) {
            return Ok(sym.address);
        }
        if let Some(sym) =
            self.functions.iter().find(|s| format!("{:#}", demangle(&s.name)) == name)
        {
            return Ok(sym.address);
        }
        Err(ControlError::SymbolNotFound(name.to_string()))
    }

    /// Resolve a file-relative address to a human-readable function label.
    ///
    /// Tries DWARF first (handles inlined frames), falls back to the
    /// containing symbol-table entry, then to the raw hex address.
    pub fn function_label(&self, addr: u64) -> String {
        if let Some(cached) = self.cache.borrow().get(&addr) {
            return cached.clone();
        }

        let label = self
            .dwarf_label(addr)
            .or_else(|| self.symtab_label(addr))
            .unwrap_or_else(|| format!("0x{addr:x}"));

        self.cache.borrow_mut().insert(addr, label.clone());
        label
    }

    fn dwarf_label(&self, addr: u64) -> Option<String> {
        let mut frame_iter = self.ctx.find_frames(addr).skip_all_loads().ok()?;
        // First frame is the outermost (non-inlined) function at this address
        while let Ok(Some(frame)) = frame_iter.next() {
            if let Some(function) = frame.function {
                if let Ok(name) = function.demangle() {
                    return Some(name.to_string());
                }
            }
        }
        None
    }

    fn symtab_label(&self, addr: u64) -> Option<String> {
        self.functions
            .iter()
            .find(|s| s.size > 0 && addr >= s.address && addr < s.address + s.size)
            .map(|s| format!("{:#}", demangle(&s.name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_rejects_missing_file() {
        let err = SymbolResolver::load("/nonexistent/image.elf").err().unwrap();
        let control = err.downcast::<ControlError>().unwrap();
        assert!(matches!(control, ControlError::Load { .. }));
    }

    #[test]
    fn test_load_rejects_non_elf() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("not-an-elf");
        fs::write(&path, b"#!/bin/sh\necho hi\n").unwrap();

        let err = SymbolResolver::load(&path).err().unwrap();
        let control = err.downcast::<ControlError>().unwrap();
        assert!(matches!(control, ControlError::Load { .. }));
    }
}
