/*!
A low-level crate for reading PDF files.

This crate implements the object layer of a PDF processor: a byte-level
tokenizer, the cross-reference machinery (classic tables, cross-reference
streams, hybrid files and a repair scan for broken files), lazy
materialization of indirect objects, the stream filter pipeline and the
standard security handler.

The entry point is [`Document`](document::Document), which owns the file
bytes and hands out materialized objects and pages on demand. Malformed
content never aborts a document; the affected object degrades to `Null`
and reading continues. The only hard failure at open time is a wrong
password.
*/

#![forbid(unsafe_code)]

use std::sync::Arc;

pub mod annot;
pub mod crypt;
pub mod document;
pub mod encoding;
pub mod filter;
pub mod function;
pub mod lexer;
pub mod object;
pub mod page;
pub mod parse;
pub mod reader;
pub mod trivia;
pub mod xref;

#[cfg(test)]
pub(crate) mod testutil;

pub use document::Document;

/// The raw bytes of a PDF file, shared between the document and its users.
pub type PdfData = Arc<dyn AsRef<[u8]> + Send + Sync>;
