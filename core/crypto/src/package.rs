//! Package construction from plaintext.

use chrono::Utc;

use crate::hash::content_hash;
use lockbox_common::{DataType, Error, Metadata, Package, Payload, Result};

/// Build a plaintext package.
///
/// # Postconditions
/// - `metadata.hash` is the content hash of `(payload, description)`
/// - `metadata.upload_date` is the current UTC time
/// - `data` holds the plaintext, ready for [`crate::PackageCodec::seal`]
pub fn pack(payload: Vec<u8>, data_type: DataType, description: impl Into<String>) -> Package {
    let description = description.into();
    let hash = content_hash(&payload, &description);

    Package::new(
        Metadata {
            upload_date: Utc::now(),
            data_type,
            description,
            hash,
        },
        payload,
    )
}

/// Encode a typed payload and pack it under its own type tag.
pub fn pack_payload<P: Payload>(payload: &P, description: impl Into<String>) -> Result<Package> {
    Ok(pack(payload.to_bytes()?, P::DATA_TYPE, description))
}

/// Decode the plaintext of an opened package into a typed payload.
///
/// # Errors
/// - Returns `Validation` if the package carries a different type tag
pub fn unpack_payload<P: Payload>(package: &Package) -> Result<P> {
    if package.metadata.data_type != P::DATA_TYPE {
        return Err(Error::Validation(format!(
            "Package holds {}, not {}",
            package.metadata.data_type,
            P::DATA_TYPE
        )));
    }
    P::from_bytes(&package.data)
}
