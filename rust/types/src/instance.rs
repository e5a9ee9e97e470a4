use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A member registered under a cluster.
///
/// This is also the API representation: empty optional fields are omitted
/// and `creator_ip` is never serialized.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Instance {
    pub id: String,
    pub cluster_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub flynn_version: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ssh_public_keys: Vec<SshPublicKey>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub url: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(skip)]
    pub creator_ip: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SshPublicKey {
    #[serde(rename = "type")]
    pub key_type: String,
    /// Raw key bytes, base64 encoded on the wire.
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
}

impl SshPublicKey {
    pub fn new(key_type: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        SshPublicKey {
            key_type: key_type.into(),
            data: data.into(),
        }
    }
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(data))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn instance() -> Instance {
        Instance {
            id: "abc".to_string(),
            cluster_id: "c1".to_string(),
            flynn_version: "20190101.1".to_string(),
            ssh_public_keys: vec![SshPublicKey::new("ssh-rsa", "asdf")],
            url: "http://1.1.1.1:1113".to_string(),
            name: "asdf".to_string(),
            creator_ip: "1.1.1.1".to_string(),
            created_at: None,
        }
    }

    #[test]
    fn test_creator_ip_is_not_serialized() {
        let value = serde_json::to_value(instance()).unwrap();
        assert!(value.get("creator_ip").is_none());
        assert_eq!(
            value["ssh_public_keys"],
            json!([{"type": "ssh-rsa", "data": "YXNkZg=="}])
        );
    }

    #[test]
    fn test_empty_fields_are_omitted() {
        let value = serde_json::to_value(Instance {
            id: "abc".to_string(),
            cluster_id: "c1".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(value, json!({"id": "abc", "cluster_id": "c1"}));
    }

    #[test]
    fn test_deserialize_partial_payload() {
        let inst: Instance = serde_json::from_value(json!({
            "url": "http://1.1.1.1:1113",
            "name": "asdf",
            "ssh_public_keys": [{"type": "ssh-ed25519", "data": "AAEC"}],
        }))
        .unwrap();
        assert_eq!(inst.id, "");
        assert_eq!(inst.url, "http://1.1.1.1:1113");
        assert_eq!(inst.ssh_public_keys[0].data, vec![0, 1, 2]);
        assert!(inst.created_at.is_none());
    }

    #[test]
    fn test_malformed_key_data_is_rejected() {
        let result: Result<Vec<SshPublicKey>, _> =
            serde_json::from_str(r#"[{"type": "ssh-rsa", "data": "not base64!"}]"#);
        assert!(result.is_err());
    }
}
