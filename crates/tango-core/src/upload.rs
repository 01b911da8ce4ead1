//! A file attached to a `command` call, kept out of the plain JSON args value on
//! both sides of the wire (server multipart parsing, client transport's upload
//! extraction — spec.md §4.6.1 and §4.8.2).

use bytes::Bytes;

/// One uploaded file: a name, an optional MIME type, and its raw bytes.
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub filename: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

impl FileUpload {
    pub fn new(filename: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            filename: filename.into(),
            content_type: None,
            bytes: bytes.into(),
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// A client-side upload argument: a single file handle, or a list of them
/// (spec.md §4.8 step 2's "single file handle, or a non-empty list whose
/// every element is a file handle"). The distinction is wire-visible
/// (§4.8 step 3): a list uses the `name[]` field-name suffix regardless of
/// how many elements it holds, a single upload never does — so a
/// one-element list and a lone upload are not interchangeable even though
/// both carry exactly one file.
#[derive(Debug, Clone)]
pub enum UploadArg {
    Single(FileUpload),
    List(Vec<FileUpload>),
}

impl UploadArg {
    pub fn files(&self) -> &[FileUpload] {
        match self {
            UploadArg::Single(file) => std::slice::from_ref(file),
            UploadArg::List(files) => files,
        }
    }

    pub fn is_list(&self) -> bool {
        matches!(self, UploadArg::List(_))
    }
}
