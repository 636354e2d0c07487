//! Low-level PDF object serialization.

use std::fmt;
use std::io::Write;

use flate2::Compression;
use flate2::write::ZlibEncoder;

use crate::error::{Error, Result};

/// Reference to an indirect object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectId(usize);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} 0 R", self.0)
    }
}

/// Collects indirect objects and writes them with a cross-reference table.
pub struct PdfWriter {
    objects: Vec<Option<Vec<u8>>>,
    compress: bool,
}

impl PdfWriter {
    pub fn new(compress: bool) -> Self {
        Self {
            objects: Vec::new(),
            compress,
        }
    }

    /// Allocate an object number to be filled in later with [`PdfWriter::set`].
    pub fn reserve(&mut self) -> ObjectId {
        self.objects.push(None);
        ObjectId(self.objects.len())
    }

    pub fn set(&mut self, id: ObjectId, body: impl Into<Vec<u8>>) {
        self.objects[id.0 - 1] = Some(body.into());
    }

    pub fn add(&mut self, body: impl Into<Vec<u8>>) -> ObjectId {
        let id = self.reserve();
        self.set(id, body);
        id
    }

    /// Add a stream, Flate-compressing it unless compression is disabled.
    pub fn add_stream(&mut self, dict: &str, data: &[u8]) -> Result<ObjectId> {
        if !self.compress {
            return Ok(self.add_encoded_stream(dict, data));
        }

        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data)?;
        let compressed = encoder.finish()?;

        let dict = if dict.is_empty() {
            "/Filter /FlateDecode".to_string()
        } else {
            format!("{} /Filter /FlateDecode", dict)
        };
        Ok(self.add_encoded_stream(&dict, &compressed))
    }

    /// Add a stream whose data is already encoded as `dict` declares.
    pub fn add_encoded_stream(&mut self, dict: &str, data: &[u8]) -> ObjectId {
        let mut body = Vec::with_capacity(data.len() + dict.len() + 40);
        body.extend_from_slice(format!("<< {} /Length {} >>\nstream\n", dict, data.len()).as_bytes());
        body.extend_from_slice(data);
        body.extend_from_slice(b"\nendstream");
        self.add(body)
    }

    /// Write the file: header, objects, xref table and trailer.
    pub fn finish<W: Write>(self, root: ObjectId, info: ObjectId, writer: &mut W) -> Result<()> {
        let mut out: Vec<u8> = Vec::new();
        out.extend_from_slice(b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n");

        let mut offsets = Vec::with_capacity(self.objects.len());
        for (i, object) in self.objects.iter().enumerate() {
            let body = object
                .as_ref()
                .ok_or_else(|| Error::Render(format!("PDF object {} was never written", i + 1)))?;
            offsets.push(out.len());
            out.extend_from_slice(format!("{} 0 obj\n", i + 1).as_bytes());
            out.extend_from_slice(body);
            out.extend_from_slice(b"\nendobj\n");
        }

        let xref_offset = out.len();
        let size = self.objects.len() + 1;
        out.extend_from_slice(format!("xref\n0 {}\n", size).as_bytes());
        out.extend_from_slice(b"0000000000 65535 f \n");
        for offset in offsets {
            out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
        }
        out.extend_from_slice(
            format!(
                "trailer\n<< /Size {} /Root {} /Info {} >>\nstartxref\n{}\n%%EOF\n",
                size, root, info, xref_offset
            )
            .as_bytes(),
        );

        writer.write_all(&out)?;
        Ok(())
    }
}

/// Text string in UTF-16BE with a byte order mark, as a hex string.
pub fn text_string(text: &str) -> String {
    let mut hex = String::from("<FEFF");
    for unit in text.encode_utf16() {
        hex.push_str(&format!("{:04X}", unit));
    }
    hex.push('>');
    hex
}

/// Literal string for a content stream, escaping delimiters.
pub fn literal_string(bytes: &[u8], out: &mut Vec<u8>) {
    out.push(b'(');
    for &b in bytes {
        match b {
            b'(' | b')' | b'\\' => {
                out.push(b'\\');
                out.push(b);
            }
            b'\r' => out.extend_from_slice(b"\\r"),
            b'\n' => out.extend_from_slice(b"\\n"),
            _ => out.push(b),
        }
    }
    out.push(b')');
}

/// Format a coordinate with at most two decimals.
pub fn num(value: f32) -> String {
    let rounded = (value * 100.0).round() / 100.0;
    if rounded.fract() == 0.0 {
        format!("{}", rounded as i64)
    } else {
        let s = format!("{:.2}", rounded);
        s.trim_end_matches('0').to_string()
    }
}
