//! Ordered output fragments and the exporter.

use std::io::Write;

/// Append-only sequence of emitted text, in emission order.  Fragments are
/// written back exactly as they were pushed; nothing adds separators.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputBuffer {
    fragments: Vec<String>,
}

impl OutputBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, fragment: impl Into<String>) {
        self.fragments.push(fragment.into());
    }

    /// Append a child's whole buffer at the current position.
    pub fn splice(&mut self, child: OutputBuffer) {
        self.fragments.extend(child.fragments);
    }

    pub fn fragments(&self) -> &[String] {
        &self.fragments
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// Write every fragment verbatim.
    pub fn export<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        for fragment in &self.fragments {
            out.write_all(fragment.as_bytes())?;
        }
        out.flush()
    }

    pub fn into_string(self) -> String {
        self.fragments.concat()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splice_keeps_order() {
        let mut parent = OutputBuffer::new();
        parent.push("a\n");
        let mut child = OutputBuffer::new();
        child.push("b");
        child.push("c\n");
        parent.splice(child);
        parent.push("d\n");
        assert_eq!(parent.fragments(), ["a\n", "b", "c\n", "d\n"]);
        assert_eq!(parent.len(), 4);
    }

    #[test]
    fn export_is_verbatim() {
        let mut buf = OutputBuffer::new();
        buf.push("no newline");
        buf.push("|\r\n");
        let mut sink = Vec::new();
        buf.export(&mut sink).unwrap();
        assert_eq!(sink, b"no newline|\r\n");
        assert_eq!(buf.into_string(), "no newline|\r\n");
    }
}
