//! Macro definitions and the table that holds them (spec §3, §4.3).

use crate::lex::Token;
use rustc_hash::FxHashMap;

pub enum BuiltinMacro {
    File,
    Line,
    Date,
    Time,
    StdC,
    StdCVersion,
    StdCHosted,
}

pub enum MacroDef {
    ObjectLike {
        body: Vec<Token>,
    },
    FunctionLike {
        params: Vec<String>,
        vararg: bool,
        body: Vec<Token>,
    },
    Builtin(BuiltinMacro),
}

impl MacroDef {
    pub fn num_params(&self) -> Option<usize> {
        match self {
            MacroDef::FunctionLike { params, .. } => Some(params.len()),
            _ => None,
        }
    }

    pub fn is_vararg(&self) -> bool {
        matches!(self, MacroDef::FunctionLike { vararg: true, .. })
    }

    pub fn is_function_like(&self) -> bool {
        matches!(self, MacroDef::FunctionLike { .. })
    }
}

#[derive(Default)]
pub struct MacroTable {
    macros: FxHashMap<String, MacroDef>,
}

impl MacroTable {
    pub fn new() -> Self {
        let mut table = MacroTable::default();
        table.define_builtins();
        table
    }

    fn define_builtins(&mut self) {
        let builtins = [
            ("__FILE__", BuiltinMacro::File),
            ("__LINE__", BuiltinMacro::Line),
            ("__DATE__", BuiltinMacro::Date),
            ("__TIME__", BuiltinMacro::Time),
            ("__STDC__", BuiltinMacro::StdC),
            ("__STDC_VERSION__", BuiltinMacro::StdCVersion),
            ("__STDC_HOSTED__", BuiltinMacro::StdCHosted),
        ];
        for (name, kind) in builtins {
            self.macros
                .insert(name.to_string(), MacroDef::Builtin(kind));
        }
    }

    pub fn define(&mut self, name: String, def: MacroDef) {
        self.macros.insert(name, def);
    }

    pub fn undef(&mut self, name: &str) {
        self.macros.remove(name);
    }

    pub fn get(&self, name: &str) -> Option<&MacroDef> {
        self.macros.get(name)
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.macros.contains_key(name)
    }
}
