//! 资源抽象
//!
//! 容器内部只有配置加载会读取资源；每次调用 `input_stream` 都返回一个新的、
//! 相互独立的读取器。

use std::fmt;
use std::fs::File;
use std::io::{self, Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// 可以多次打开的输入源
pub trait InputStreamSource: Send + Sync {
    /// 返回一个新的读取器，从头开始读取
    fn input_stream(&self) -> io::Result<Box<dyn Read + Send>>;
}

/// 带描述信息的资源
pub trait Resource: InputStreamSource {
    /// 资源描述（用于日志和错误信息）
    fn description(&self) -> String;

    fn exists(&self) -> bool {
        true
    }

    /// 读取全部内容为 UTF-8 字符串
    fn read_to_string(&self) -> io::Result<String> {
        let mut content = String::new();
        self.input_stream()?.read_to_string(&mut content)?;
        Ok(content)
    }
}

/// 内存字节资源
#[derive(Clone)]
pub struct ByteArrayResource {
    bytes: Arc<[u8]>,
    description: String,
}

impl ByteArrayResource {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: Arc::from(bytes.into()),
            description: "byte array resource".to_string(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl InputStreamSource for ByteArrayResource {
    fn input_stream(&self) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(Cursor::new(Arc::clone(&self.bytes))))
    }
}

impl Resource for ByteArrayResource {
    fn description(&self) -> String {
        format!("{} ({} bytes)", self.description, self.bytes.len())
    }
}

impl fmt::Debug for ByteArrayResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description())
    }
}

/// 文件系统资源
#[derive(Debug, Clone)]
pub struct FileSystemResource {
    path: PathBuf,
}

impl FileSystemResource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl InputStreamSource for FileSystemResource {
    fn input_stream(&self) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(File::open(&self.path)?))
    }
}

impl Resource for FileSystemResource {
    fn description(&self) -> String {
        format!("file [{}]", self.path.display())
    }

    fn exists(&self) -> bool {
        self.path.is_file()
    }
}
