/// Built-in OCR backends.
pub mod tesseract;
