//! Deterministic names for everything the operator manages
//!
//! Every managed object is found again on the next pass purely by name, so
//! these functions must stay stable across operator releases.

use std::collections::BTreeMap;

use kube::ResourceExt;

use crate::crd::{ExternalDNS, ProviderType, SecretRef};
use crate::{Error, Result, APP_INSTANCE_LABEL, APP_NAME_LABEL, EXTERNAL_DNS_BASE_NAME};

/// DNS-1123 subdomain limit for object names
pub const MAX_RESOURCE_NAME_LEN: usize = 253;

/// Limit for label values
pub const MAX_LABEL_VALUE_LEN: usize = 63;

/// Alphabet without vowels and look-alike characters, so encoded hashes never
/// spell words
const SAFE_ALPHABET: &[u8; 27] = b"bcdfghjklmnpqrstvwxz2456789";

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// Name of the ServiceAccount, ClusterRoleBinding and Deployment of an instance
pub fn resource_name(instance: &ExternalDNS) -> Result<String> {
    let name = format!("{}-{}", EXTERNAL_DNS_BASE_NAME, instance.name_any());
    if name.len() > MAX_RESOURCE_NAME_LEN {
        return Err(Error::name_too_long(name, MAX_RESOURCE_NAME_LEN));
    }
    Ok(name)
}

/// Name of the operand container serving `zone`
///
/// Distinct zones may collide; nothing detects it.
pub fn container_name(zone: &str) -> String {
    format!("{}-{}", EXTERNAL_DNS_BASE_NAME, hash_string(zone))
}

/// Name of the operand-namespace copy of an instance's credentials secret
pub fn dest_credentials_secret_name(instance: &ExternalDNS) -> Result<String> {
    let name = format!("{}-credentials-{}", EXTERNAL_DNS_BASE_NAME, instance.name_any());
    if name.len() > MAX_RESOURCE_NAME_LEN {
        return Err(Error::name_too_long(name, MAX_RESOURCE_NAME_LEN));
    }
    Ok(name)
}

/// Selector labels shared by the Deployment and its pods
pub fn app_labels(instance: &ExternalDNS) -> Result<BTreeMap<String, String>> {
    let name = instance.name_any();
    if name.len() > MAX_LABEL_VALUE_LEN {
        return Err(Error::name_too_long(name, MAX_LABEL_VALUE_LEN));
    }
    Ok(BTreeMap::from([
        (APP_NAME_LABEL.to_string(), EXTERNAL_DNS_BASE_NAME.to_string()),
        (APP_INSTANCE_LABEL.to_string(), name),
    ]))
}

/// Secret holding the provider credentials, if the instance references one
pub fn credentials_secret_ref(instance: &ExternalDNS) -> Result<Option<SecretRef>> {
    let provider = &instance.spec.provider;
    let secret = match &provider.type_ {
        ProviderType::Aws => provider.aws.as_ref().map(|o| &o.credentials),
        ProviderType::Gcp => provider.gcp.as_ref().map(|o| &o.credentials),
        ProviderType::Azure => provider.azure.as_ref().map(|o| &o.config_file),
        ProviderType::BlueCat => provider.blue_cat.as_ref().map(|o| &o.config_file),
        ProviderType::Infoblox => provider.infoblox.as_ref().map(|o| &o.credentials),
        ProviderType::Unsupported(raw) => {
            return Err(Error::unsupported_provider(instance.name_any(), raw.clone()))
        }
    };
    Ok(secret.cloned())
}

/// FNV-1a over `input`, digest printed as a decimal byte list and mapped onto
/// [`SAFE_ALPHABET`]
fn hash_string(input: &str) -> String {
    let digest = fnv1a_32(input.as_bytes()).to_be_bytes();
    let printed = format!(
        "[{} {} {} {}]",
        digest[0], digest[1], digest[2], digest[3]
    );
    printed
        .bytes()
        .map(|b| SAFE_ALPHABET[b as usize % SAFE_ALPHABET.len()] as char)
        .collect()
}

fn fnv1a_32(bytes: &[u8]) -> u32 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, b| {
        (hash ^ u32::from(*b)).wrapping_mul(FNV_PRIME)
    })
}
