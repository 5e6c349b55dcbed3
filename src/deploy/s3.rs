//! S3-compatible [`RemoteStore`] on the blocking `rust-s3` client.
//!
//! Works against any endpoint that speaks the S3 API (Yandex Object Storage,
//! Cloudflare R2, MinIO, AWS) through a custom region. Every request carries
//! the configured canned ACL as an `x-amz-acl` header so uploaded objects are
//! publicly readable without a bucket policy.

use super::S3Settings;
use super::remote::{RemoteError, RemoteObject, RemoteStore};
use s3::bucket::Bucket;
use s3::creds::Credentials;
use s3::error::S3Error;
use s3::region::Region;

pub struct S3Store {
    bucket: Box<Bucket>,
}

impl S3Store {
    pub fn new(settings: &S3Settings) -> Result<Self, RemoteError> {
        let region = Region::Custom {
            region: settings.region.clone(),
            endpoint: settings.endpoint.clone(),
        };
        let creds = Credentials::new(
            Some(settings.access_key.as_str()),
            Some(settings.secret_key.as_str()),
            None,
            None,
            None,
        )
        .map_err(|e| request_error("", e))?;
        let mut bucket = Bucket::new(&settings.bucket, region, creds).map_err(|e| request_error("", e))?;
        if settings.path_style {
            bucket = bucket.with_path_style();
        }
        if !settings.acl.is_empty() {
            bucket.add_header("x-amz-acl", &settings.acl);
        }
        log::debug!(
            "s3 store: bucket {} at {} ({})",
            settings.bucket,
            settings.endpoint,
            settings.region
        );
        Ok(Self {
            bucket: Box::new(bucket),
        })
    }
}

fn request_error(key: &str, e: impl std::fmt::Display) -> RemoteError {
    RemoteError::Request {
        key: key.to_string(),
        message: e.to_string(),
    }
}

/// Map a client error, turning HTTP failures into [`RemoteError::Status`].
fn map_error(key: &str, e: S3Error) -> RemoteError {
    match e {
        S3Error::HttpFailWithBody(status, _) => RemoteError::Status {
            key: key.to_string(),
            status,
        },
        other => request_error(key, other),
    }
}

fn check_status(key: &str, status: u16) -> Result<(), RemoteError> {
    if (200..300).contains(&status) {
        Ok(())
    } else {
        Err(RemoteError::Status {
            key: key.to_string(),
            status,
        })
    }
}

fn object_path(key: &str) -> String {
    format!("/{key}")
}

impl RemoteStore for S3Store {
    fn list(&self) -> Result<Vec<RemoteObject>, RemoteError> {
        let pages = self
            .bucket
            .list(String::new(), None)
            .map_err(|e| map_error("", e))?;
        Ok(pages
            .into_iter()
            .flat_map(|page| page.contents)
            .map(|object| RemoteObject {
                key: object.key,
                size: object.size,
            })
            .collect())
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, RemoteError> {
        log::debug!("GET {key}");
        match self.bucket.get_object(object_path(key)) {
            Ok(resp) if resp.status_code() == 404 => Ok(None),
            Ok(resp) => {
                check_status(key, resp.status_code())?;
                Ok(Some(resp.as_slice().to_vec()))
            }
            Err(S3Error::HttpFailWithBody(404, _)) => Ok(None),
            Err(e) => Err(map_error(key, e)),
        }
    }

    fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<(), RemoteError> {
        log::debug!("PUT {key} ({} bytes, {content_type})", bytes.len());
        let resp = self
            .bucket
            .put_object_with_content_type(object_path(key), bytes, content_type)
            .map_err(|e| map_error(key, e))?;
        check_status(key, resp.status_code())
    }

    fn delete(&self, key: &str) -> Result<(), RemoteError> {
        log::debug!("DELETE {key}");
        let resp = self
            .bucket
            .delete_object(object_path(key))
            .map_err(|e| map_error(key, e))?;
        check_status(key, resp.status_code())
    }
}
