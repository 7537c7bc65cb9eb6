use std::collections::BTreeMap;
use std::error::Error;
use std::fs::File;
use std::io::{BufWriter, Read, Seek, Write};
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use memmap2::Mmap;
use ndarray::{Array1, Array2};
use tracing::{debug, info};

use super::types::{ArtifactError, ArtifactValue, TensorInfo};

/// The magic number that identifies model artifact files
pub const ARTIFACT_MAGIC: u32 = 0x4D415153; // "SQAM" in ASCII

/// Current version of the artifact format
pub const ARTIFACT_VERSION: u32 = 1;

/// Alignment of the tensor data section, in bytes
const DATA_ALIGNMENT: u64 = 32;

// Guards header parsing against absurd lengths in corrupt files.
const MAX_STRING_LEN: u64 = 1 << 20;
const MAX_DIMS: u32 = 4;

/// A parsed, memory-mapped model artifact.
///
/// The header (metadata and tensor table) is read eagerly; tensor payloads
/// stay in the memory map until extracted with `tensor_1d`/`tensor_2d`.
pub struct ModelArtifact {
    /// Path to the artifact file
    pub path: PathBuf,
    /// Metadata key-value pairs
    pub metadata: BTreeMap<String, ArtifactValue>,
    /// Information about each tensor
    pub tensors: Vec<TensorInfo>,
    /// Memory-mapped file contents
    data: Mmap,
    /// Byte offset where the aligned data section begins
    data_start: usize,
}

impl ModelArtifact {
    /// Opens and parses an artifact file.
    ///
    /// Fails with `ArtifactError::InvalidFormat` on a bad magic number,
    /// unsupported version, or truncated/corrupt header.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let path = path.as_ref().to_path_buf();
        let mut file = File::open(&path).map_err(ArtifactError::Io)?;

        let magic = file.read_u32::<LittleEndian>().map_err(ArtifactError::Io)?;
        if magic != ARTIFACT_MAGIC {
            return Err(Box::new(ArtifactError::InvalidFormat(
                "Invalid magic number".to_string(),
            )));
        }

        let version = file.read_u32::<LittleEndian>()?;
        if version != ARTIFACT_VERSION {
            return Err(Box::new(ArtifactError::InvalidFormat(format!(
                "Unsupported artifact version: {}",
                version
            ))));
        }

        let tensor_count = file.read_u64::<LittleEndian>()?;
        let metadata_count = file.read_u64::<LittleEndian>()?;

        debug!(
            "Reading artifact: {} tensors, {} metadata entries",
            tensor_count, metadata_count
        );

        let mut metadata = BTreeMap::new();
        for _ in 0..metadata_count {
            let key = read_string(&mut file)?;
            let tag = file.read_u32::<LittleEndian>()?;
            let value = read_value(&mut file, tag)?;
            metadata.insert(key, value);
        }

        let mut tensors = Vec::with_capacity(tensor_count as usize);
        for _ in 0..tensor_count {
            tensors.push(read_tensor_info(&mut file)?);
        }

        let header_end = file.stream_position()?;
        let data_start = align_up(header_end, DATA_ALIGNMENT) as usize;

        // Header is parsed; map the whole file for tensor access.
        let data = unsafe { Mmap::map(&file) }.map_err(ArtifactError::Io)?;
        if data.len() < data_start {
            return Err(Box::new(ArtifactError::InvalidFormat(
                "File ends before the tensor data section".to_string(),
            )));
        }

        info!(
            "Read artifact {}: {} tensors, {} metadata entries",
            path.display(),
            tensor_count,
            metadata_count
        );

        Ok(Self {
            path,
            metadata,
            tensors,
            data,
            data_start,
        })
    }

    /// Looks up a metadata value by key.
    pub fn metadata_value(&self, key: &str) -> Result<&ArtifactValue, Box<dyn Error + Send + Sync>> {
        Ok(self
            .metadata
            .get(key)
            .ok_or_else(|| ArtifactError::MetadataNotFound(key.to_string()))?)
    }

    /// Looks up a metadata value that must be an unsigned integer.
    pub fn require_u32(&self, key: &str) -> Result<u32, Box<dyn Error + Send + Sync>> {
        Ok(self.metadata_value(key)?.as_u32().ok_or_else(|| {
            ArtifactError::InvalidFormat(format!("Metadata key {} is not an integer", key))
        })?)
    }

    /// Looks up a metadata value that must be a string.
    pub fn require_str(&self, key: &str) -> Result<&str, Box<dyn Error + Send + Sync>> {
        Ok(self.metadata_value(key)?.as_str().ok_or_else(|| {
            ArtifactError::InvalidFormat(format!("Metadata key {} is not a string", key))
        })?)
    }

    /// Finds a tensor's table entry by name.
    pub fn tensor_info(&self, name: &str) -> Option<&TensorInfo> {
        self.tensors.iter().find(|t| t.name == name)
    }

    /// Extracts a tensor's payload as a flat f32 vector.
    fn tensor_data(&self, info: &TensorInfo) -> Result<Vec<f32>, Box<dyn Error + Send + Sync>> {
        let count = info.element_count();
        let start = self.data_start + info.offset as usize;
        let end = start + count * std::mem::size_of::<f32>();
        if end > self.data.len() {
            return Err(Box::new(ArtifactError::InvalidFormat(format!(
                "Tensor {} data extends past end of file",
                info.name
            ))));
        }

        let mut values = vec![0f32; count];
        let mut bytes = &self.data[start..end];
        bytes.read_f32_into::<LittleEndian>(&mut values)?;
        Ok(values)
    }

    /// Extracts a one-dimensional tensor, validating its length.
    pub fn tensor_1d(&self, name: &str, len: usize) -> Result<Array1<f32>, Box<dyn Error + Send + Sync>> {
        let info = self
            .tensor_info(name)
            .ok_or_else(|| ArtifactError::TensorNotFound(name.to_string()))?;
        if info.dims != [len as u64] {
            return Err(Box::new(ArtifactError::ShapeMismatch {
                name: name.to_string(),
                expected: vec![len as u64],
                actual: info.dims.clone(),
            }));
        }
        Ok(Array1::from_vec(self.tensor_data(info)?))
    }

    /// Extracts a two-dimensional tensor, validating its shape.
    pub fn tensor_2d(
        &self,
        name: &str,
        rows: usize,
        cols: usize,
    ) -> Result<Array2<f32>, Box<dyn Error + Send + Sync>> {
        let info = self
            .tensor_info(name)
            .ok_or_else(|| ArtifactError::TensorNotFound(name.to_string()))?;
        if info.dims != [rows as u64, cols as u64] {
            return Err(Box::new(ArtifactError::ShapeMismatch {
                name: name.to_string(),
                expected: vec![rows as u64, cols as u64],
                actual: info.dims.clone(),
            }));
        }
        let values = self.tensor_data(info)?;
        Ok(Array2::from_shape_vec((rows, cols), values)?)
    }
}

/// Checks if a file at the given path is a model artifact by verifying its
/// magic number.
pub fn is_model_artifact<P: AsRef<Path>>(path: P) -> bool {
    if let Ok(mut file) = File::open(path) {
        if let Ok(magic) = file.read_u32::<LittleEndian>() {
            return magic == ARTIFACT_MAGIC;
        }
    }
    false
}

/// Builder for writing model artifacts.
///
/// Used by the offline export pipeline and by tests; the serving path only
/// reads artifacts.
#[derive(Default)]
pub struct ModelArtifactBuilder {
    metadata: BTreeMap<String, ArtifactValue>,
    tensors: Vec<(String, Vec<u64>, Vec<f32>)>,
}

impl ModelArtifactBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a metadata entry, replacing any previous value for the key.
    pub fn set_metadata(mut self, key: &str, value: ArtifactValue) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }

    /// Adds a tensor; the data length must match the product of the dims.
    pub fn add_tensor(
        mut self,
        name: &str,
        dims: &[u64],
        data: Vec<f32>,
    ) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let expected: usize = dims.iter().map(|&d| d as usize).product();
        if data.len() != expected {
            return Err(Box::new(ArtifactError::ShapeMismatch {
                name: name.to_string(),
                expected: dims.to_vec(),
                actual: vec![data.len() as u64],
            }));
        }
        self.tensors.push((name.to_string(), dims.to_vec(), data));
        Ok(self)
    }

    /// Writes the artifact to disk in the format `ModelArtifact::open` reads.
    pub fn write_to<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn Error + Send + Sync>> {
        // Lay out tensor payloads first so the table can carry offsets.
        let mut offsets = Vec::with_capacity(self.tensors.len());
        let mut cursor = 0u64;
        for (_, _, data) in &self.tensors {
            offsets.push(cursor);
            cursor += (data.len() * std::mem::size_of::<f32>()) as u64;
            cursor = align_up(cursor, DATA_ALIGNMENT);
        }

        let mut header: Vec<u8> = Vec::new();
        header.write_u32::<LittleEndian>(ARTIFACT_MAGIC)?;
        header.write_u32::<LittleEndian>(ARTIFACT_VERSION)?;
        header.write_u64::<LittleEndian>(self.tensors.len() as u64)?;
        header.write_u64::<LittleEndian>(self.metadata.len() as u64)?;

        for (key, value) in &self.metadata {
            write_string(&mut header, key)?;
            header.write_u32::<LittleEndian>(value.type_tag())?;
            match value {
                ArtifactValue::U32(v) => header.write_u32::<LittleEndian>(*v)?,
                ArtifactValue::F32(v) => header.write_f32::<LittleEndian>(*v)?,
                ArtifactValue::Bool(v) => header.write_u8(*v as u8)?,
                ArtifactValue::String(s) => write_string(&mut header, s)?,
            }
        }

        for ((name, dims, _), offset) in self.tensors.iter().zip(&offsets) {
            write_string(&mut header, name)?;
            header.write_u32::<LittleEndian>(dims.len() as u32)?;
            for &dim in dims {
                header.write_u64::<LittleEndian>(dim)?;
            }
            header.write_u64::<LittleEndian>(*offset)?;
        }

        let data_start = align_up(header.len() as u64, DATA_ALIGNMENT);

        let file = File::create(path).map_err(ArtifactError::Io)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(&header)?;
        pad_to_alignment(&mut writer, header.len() as u64, data_start)?;

        let mut written = 0u64;
        for ((_, _, data), offset) in self.tensors.iter().zip(&offsets) {
            pad_to_alignment(&mut writer, written, *offset)?;
            for &value in data {
                writer.write_f32::<LittleEndian>(value)?;
            }
            written = offset + (data.len() * std::mem::size_of::<f32>()) as u64;
        }

        writer.flush()?;
        Ok(())
    }
}

fn align_up(value: u64, alignment: u64) -> u64 {
    (value + alignment - 1) / alignment * alignment
}

fn pad_to_alignment<W: Write>(writer: &mut W, from: u64, to: u64) -> Result<(), std::io::Error> {
    for _ in from..to {
        writer.write_u8(0)?;
    }
    Ok(())
}

/// Read a length-prefixed UTF-8 string from the header
fn read_string<R: Read>(reader: &mut R) -> Result<String, Box<dyn Error + Send + Sync>> {
    let len = reader.read_u64::<LittleEndian>()?;
    if len > MAX_STRING_LEN {
        return Err(Box::new(ArtifactError::InvalidFormat(format!(
            "String length {} exceeds limit",
            len
        ))));
    }
    let mut buffer = vec![0u8; len as usize];
    reader.read_exact(&mut buffer)?;
    Ok(String::from_utf8(buffer)
        .map_err(|e| ArtifactError::InvalidFormat(format!("Invalid UTF-8 in string: {}", e)))?)
}

fn write_string<W: Write>(writer: &mut W, s: &str) -> Result<(), std::io::Error> {
    writer.write_u64::<LittleEndian>(s.len() as u64)?;
    writer.write_all(s.as_bytes())
}

/// Read a metadata value of the type identified by the given tag
fn read_value<R: Read>(reader: &mut R, tag: u32) -> Result<ArtifactValue, Box<dyn Error + Send + Sync>> {
    match tag {
        0 => Ok(ArtifactValue::U32(reader.read_u32::<LittleEndian>()?)),
        1 => Ok(ArtifactValue::F32(reader.read_f32::<LittleEndian>()?)),
        2 => Ok(ArtifactValue::Bool(reader.read_u8()? != 0)),
        3 => Ok(ArtifactValue::String(read_string(reader)?)),
        _ => Err(Box::new(ArtifactError::InvalidFormat(format!(
            "Unknown metadata value type: {}",
            tag
        )))),
    }
}

fn read_tensor_info<R: Read>(reader: &mut R) -> Result<TensorInfo, Box<dyn Error + Send + Sync>> {
    let name = read_string(reader)?;

    let n_dims = reader.read_u32::<LittleEndian>()?;
    if n_dims == 0 || n_dims > MAX_DIMS {
        return Err(Box::new(ArtifactError::InvalidFormat(format!(
            "Tensor {} has unsupported dimension count: {}",
            name, n_dims
        ))));
    }

    let mut dims = Vec::with_capacity(n_dims as usize);
    for _ in 0..n_dims {
        dims.push(reader.read_u64::<LittleEndian>()?);
    }

    let offset = reader.read_u64::<LittleEndian>()?;

    Ok(TensorInfo { name, dims, offset })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_builder() -> ModelArtifactBuilder {
        ModelArtifactBuilder::new()
            .set_metadata("general.architecture", ArtifactValue::String("dual_lstm".to_string()))
            .set_metadata("dual_lstm.vocab_size", ArtifactValue::U32(8))
            .set_metadata("dual_lstm.dropout", ArtifactValue::F32(0.25))
            .set_metadata("general.trainable", ArtifactValue::Bool(false))
            .add_tensor("output.bias", &[1], vec![0.5])
            .unwrap()
            .add_tensor("output.weight", &[3, 2], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0])
            .unwrap()
    }

    #[test]
    fn round_trip_preserves_metadata_and_tensors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.sqam");
        sample_builder().write_to(&path).unwrap();

        let artifact = ModelArtifact::open(&path).unwrap();
        assert_eq!(artifact.require_str("general.architecture").unwrap(), "dual_lstm");
        assert_eq!(artifact.require_u32("dual_lstm.vocab_size").unwrap(), 8);
        assert_eq!(
            artifact.metadata_value("general.trainable").unwrap(),
            &ArtifactValue::Bool(false)
        );

        let bias = artifact.tensor_1d("output.bias", 1).unwrap();
        assert_eq!(bias[0], 0.5);

        let weight = artifact.tensor_2d("output.weight", 3, 2).unwrap();
        assert_eq!(weight[[0, 0]], 1.0);
        assert_eq!(weight[[2, 1]], 6.0);
    }

    #[test]
    fn magic_number_check_identifies_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.sqam");
        sample_builder().write_to(&path).unwrap();
        assert!(is_model_artifact(&path));

        let other = dir.path().join("not-a-model.txt");
        std::fs::write(&other, "just some text").unwrap();
        assert!(!is_model_artifact(&other));
    }

    #[test]
    fn bad_magic_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.sqam");
        std::fs::write(&path, vec![0u8; 64]).unwrap();
        assert!(ModelArtifact::open(&path).is_err());
    }

    #[test]
    fn truncated_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.sqam");
        sample_builder().write_to(&path).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        let truncated = dir.path().join("truncated.sqam");
        std::fs::write(&truncated, &bytes[..40]).unwrap();
        assert!(ModelArtifact::open(&truncated).is_err());
    }

    #[test]
    fn missing_metadata_and_tensors_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.sqam");
        sample_builder().write_to(&path).unwrap();

        let artifact = ModelArtifact::open(&path).unwrap();
        assert!(artifact.metadata_value("general.name").is_err());
        assert!(artifact.tensor_1d("no.such.tensor", 1).is_err());
    }

    #[test]
    fn shape_mismatch_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.sqam");
        sample_builder().write_to(&path).unwrap();

        let artifact = ModelArtifact::open(&path).unwrap();
        assert!(artifact.tensor_2d("output.weight", 2, 3).is_err());
        assert!(artifact.tensor_1d("output.weight", 6).is_err());
    }

    #[test]
    fn builder_rejects_mismatched_data_length() {
        let result = ModelArtifactBuilder::new().add_tensor("w", &[2, 2], vec![1.0, 2.0]);
        assert!(result.is_err());
    }
}
