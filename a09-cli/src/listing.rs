use std::fmt::{self, Display};

use a09::symbol::{Binding, SymbolTable};
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, ContentArrangement, Table};

/// Simple `name: value` block, used for the listing file's header summary.
pub struct ListingFormatter {
    indent: usize,
    values: Vec<(&'static str, String)>,
}

impl ListingFormatter {
    pub fn new(indent: usize) -> Self {
        Self {
            indent,
            values: Vec::new(),
        }
    }

    pub fn add(&mut self, name: &'static str, value: impl Display) {
        self.values.push((name, value.to_string()));
    }
}

impl Display for ListingFormatter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let max_name_width = self.values.iter().map(|(name, _)| name.len()).max().unwrap_or(0);

        for (name, value) in self.values.iter() {
            let padding = max_name_width - name.len();
            writeln!(f, "{}{name}:{} {value}", " ".repeat(self.indent), " ".repeat(padding))?;
        }
        Ok(())
    }
}

fn binding_name(b: Binding) -> &'static str {
    match b {
        Binding::Undefined => "undefined",
        Binding::Address => "address",
        Binding::Equate => "equate",
        Binding::Set => "set",
        Binding::Public => "public",
        Binding::Extern => "extern",
    }
}

/// Render the final symbol table as a table, in label order, for the `-l` listing file.
pub fn symbol_table(symbols: &SymbolTable) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(["Symbol", "Value", "Kind", "File", "Line", "Refs"]);

    for (label, sym) in symbols.iter() {
        table.add_row([
            label.as_str().to_string(),
            format!("${:04X}", sym.value),
            binding_name(sym.binding).to_string(),
            sym.file.clone(),
            sym.line.to_string(),
            sym.refs.to_string(),
        ]);
    }

    table.to_string()
}
