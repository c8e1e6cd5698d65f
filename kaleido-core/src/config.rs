use std::collections::HashMap;

/// Binary operator precedences. Higher binds tighter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrecedenceTable {
    entries: HashMap<char, i32>,
}

impl PrecedenceTable {
    pub fn empty() -> Self {
        PrecedenceTable {
            entries: HashMap::new(),
        }
    }

    pub fn insert(&mut self, op: char, precedence: i32) {
        self.entries.insert(op, precedence);
    }

    /// Precedence of `op` if it is a binary operator. Missing and
    /// non-positive entries are not operators.
    pub fn get(&self, op: char) -> Option<i32> {
        self.entries.get(&op).copied().filter(|prec| *prec > 0)
    }
}

impl Default for PrecedenceTable {
    fn default() -> Self {
        let mut table = PrecedenceTable::empty();
        table.insert('<', 10);
        table.insert('+', 20);
        table.insert('-', 20);
        table.insert('*', 40);
        table
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontendConfig {
    pub precedence: PrecedenceTable,
    /// Turn malformed numeric literals into lex errors instead of using
    /// their longest valid prefix.
    pub strict_numbers: bool,
    pub module_name: String,
}

impl Default for FrontendConfig {
    fn default() -> Self {
        FrontendConfig {
            precedence: PrecedenceTable::default(),
            strict_numbers: false,
            module_name: "kaleido".to_string(),
        }
    }
}
