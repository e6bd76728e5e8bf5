use std::fmt;

use url::Url;

use crate::error::{StorageError, StorageResult};

/// A remote object identifier split into protocol and protocol-stripped
/// path, e.g. `s3://bucket/dir/file.h5ad` becomes `("s3", "bucket/dir/file.h5ad")`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RemoteId {
    protocol: String,
    path: String,
}

impl RemoteId {
    pub fn parse(s: &str) -> StorageResult<Self> {
        let Some((_, rest)) = s.split_once("://") else {
            return Err(StorageError::InvalidRemoteId {
                id: s.to_string(),
                msg: "missing '<protocol>://' prefix".to_string(),
            });
        };
        // Validates the scheme; the path is kept verbatim below.
        let url = Url::parse(s).map_err(|e| StorageError::InvalidRemoteId {
            id: s.to_string(),
            msg: e.to_string(),
        })?;
        let path = normalize(rest);
        if path.is_empty() {
            return Err(StorageError::InvalidRemoteId {
                id: s.to_string(),
                msg: "empty path".to_string(),
            });
        }
        Ok(Self {
            protocol: url.scheme().to_string(),
            path,
        })
    }

    pub fn new(protocol: impl Into<String>, path: &str) -> Self {
        Self {
            protocol: protocol.into(),
            path: normalize(path),
        }
    }

    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    /// Path without the protocol prefix.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Final path segment.
    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    /// Suffix of the final segment including the dot, or `""`.
    pub fn suffix(&self) -> &str {
        let name = self.name();
        match name.rfind('.') {
            Some(0) | None => "",
            Some(i) => &name[i..],
        }
    }

    /// Identifier with the last segment removed, or `None` at the top.
    pub fn parent(&self) -> Option<RemoteId> {
        let (head, _) = self.path.rsplit_once('/')?;
        Some(Self {
            protocol: self.protocol.clone(),
            path: head.to_string(),
        })
    }

    /// Extend the path by `segment`. Pure; performs no I/O.
    pub fn join(&self, segment: &str) -> RemoteId {
        let segment = normalize(segment);
        let path = if segment.is_empty() {
            self.path.clone()
        } else {
            format!("{}/{}", self.path, segment)
        };
        Self {
            protocol: self.protocol.clone(),
            path,
        }
    }
}

impl fmt::Display for RemoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.protocol, self.path)
    }
}

fn normalize(path: &str) -> String {
    path.split('/')
        .filter(|seg| !seg.is_empty() && *seg != ".")
        .collect::<Vec<_>>()
        .join("/")
}
