//! Programs

use super::Function;
use super::pretty::{format_function, format_function_cfg};
use crate::cfg::{self, CfgReport};

/// A program containing all functions
#[derive(Debug, Clone, Default)]
pub struct Program {
    functions: Vec<Function>,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty function and return it for construction
    pub fn add_function(&mut self, name: impl Into<String>) -> &mut Function {
        self.functions.push(Function::new(name));
        let last = self.functions.len() - 1;
        &mut self.functions[last]
    }

    /// Adopt an already built function
    pub fn push_function(&mut self, func: Function) {
        self.functions.push(func);
    }

    pub fn functions(&self) -> &[Function] {
        &self.functions
    }

    pub fn functions_mut(&mut self) -> &mut [Function] {
        &mut self.functions
    }

    pub fn function_by_name(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name() == name)
    }

    pub fn function_by_name_mut(&mut self, name: &str) -> Option<&mut Function> {
        self.functions.iter_mut().find(|f| f.name() == name)
    }

    /// Rebuild the CFG of every function, one report per function
    pub fn build_cfg(&mut self) -> Vec<CfgReport> {
        self.functions.iter_mut().map(cfg::build_cfg).collect()
    }

    /// Textual listing of every function
    pub fn dump(&self) -> String {
        self.functions
            .iter()
            .map(format_function)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Listing of every function with predecessor/successor sets per block
    pub fn dump_with_cfg(&self) -> String {
        self.functions
            .iter()
            .map(format_function_cfg)
            .collect::<Vec<_>>()
            .join("\n")
    }
}
