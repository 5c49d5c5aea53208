//! Builds an arbitrary `Document` and `Filter` out of raw fuzzer bytes and
//! checks that `Filter::matches` never panics, regardless of which fields
//! are present, what type a value actually is, or how deeply `Filter::And`
//! is nested. This is the boundary where caller-supplied metadata (free-
//! form JSON) meets the query predicate the engine evaluates against it.

#![no_main]

use libfuzzer_sys::fuzz_target;
use kaerdb::docstore::Filter;
use kaerdb::types::{Document, Value};

const FIELDS: [&str; 4] = ["a", "b", "n", "missing"];

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn byte(&mut self) -> u8 {
        let b = self.data.get(self.pos).copied().unwrap_or(0);
        self.pos += 1;
        b
    }

    fn i64(&mut self) -> i64 {
        let mut buf = [0u8; 8];
        for slot in &mut buf {
            *slot = self.byte();
        }
        i64::from_le_bytes(buf)
    }

    fn field(&mut self) -> &'static str {
        FIELDS[self.byte() as usize % FIELDS.len()]
    }

    fn value(&mut self) -> Value {
        match self.byte() % 3 {
            0 => Value::from(self.i64()),
            1 => Value::from(self.i64() as f64 / 7.0),
            _ => Value::from(format!("s{}", self.i64())),
        }
    }

    fn filter(&mut self, depth: u32) -> Filter {
        if depth == 0 || self.pos >= self.data.len() {
            return Filter::All;
        }
        match self.byte() % 6 {
            0 => Filter::All,
            1 => Filter::Eq(self.field().to_string(), self.value()),
            2 => Filter::Gt(self.field().to_string(), self.value()),
            3 => Filter::Gte(self.field().to_string(), self.value()),
            4 => Filter::Lt(self.field().to_string(), self.value()),
            _ => {
                let n = (self.byte() % 4) as usize;
                Filter::And((0..n).map(|_| self.filter(depth - 1)).collect())
            }
        }
    }
}

fuzz_target!(|data: &[u8]| {
    let mut reader = Reader { data, pos: 0 };

    let mut doc = Document::new();
    let field_count = reader.byte() % (FIELDS.len() as u8 + 1);
    for _ in 0..field_count {
        let field = reader.field();
        let value = reader.value();
        doc.insert(field.to_string(), value);
    }

    let filter = reader.filter(8);
    let _ = filter.matches(&doc);
});
