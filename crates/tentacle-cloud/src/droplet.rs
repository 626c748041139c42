//! Wire types for the droplet endpoints and their mapping onto [`Machine`].

use serde::{Deserialize, Serialize};

use tentacle_core::{Machine, MachineId, MachineSpec};

/// One droplet as returned by `GET /droplets` and `POST /droplets`.
#[derive(Debug, Clone, Deserialize)]
pub struct Droplet {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub networks: Networks,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Networks {
    #[serde(default)]
    pub v4: Vec<NetworkV4>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkV4 {
    pub ip_address: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl Droplet {
    /// First IPv4 address of the given network type (`public` / `private`).
    pub fn ipv4(&self, kind: &str) -> Option<String> {
        self.networks
            .v4
            .iter()
            .find(|n| n.kind == kind)
            .map(|n| n.ip_address.clone())
    }
}

impl From<Droplet> for Machine {
    fn from(droplet: Droplet) -> Self {
        Machine {
            id: MachineId::from(droplet.id),
            public_ipv4: droplet.ipv4("public"),
            private_ipv4: droplet.ipv4("private"),
            name: droplet.name,
        }
    }
}

/// One page of `GET /droplets`.
#[derive(Debug, Clone, Deserialize)]
pub struct DropletPage {
    #[serde(default)]
    pub droplets: Vec<Droplet>,
    #[serde(default)]
    pub links: Option<Links>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Links {
    #[serde(default)]
    pub pages: Option<Pages>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Pages {
    pub next: Option<String>,
    pub last: Option<String>,
}

impl DropletPage {
    /// A page is the last one when the API omits `links.pages.next`.
    pub fn has_next(&self) -> bool {
        self.links
            .as_ref()
            .and_then(|l| l.pages.as_ref())
            .and_then(|p| p.next.as_ref())
            .is_some()
    }
}

/// Body of `POST /droplets`.
#[derive(Debug, Clone, Serialize)]
pub struct CreateDropletRequest<'a> {
    pub name: &'a str,
    pub region: &'a str,
    pub size: &'a str,
    pub image: &'a str,
    pub private_networking: bool,
    pub ssh_keys: &'a [String],
}

impl<'a> CreateDropletRequest<'a> {
    pub fn new(name: &'a str, spec: &'a MachineSpec) -> Self {
        Self {
            name,
            region: &spec.region,
            size: &spec.size,
            image: &spec.image,
            private_networking: spec.private_networking,
            ssh_keys: &spec.ssh_key_fingerprints,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateDropletResponse {
    pub droplet: Droplet,
}

/// Error body returned by the API on non-2xx responses.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub id: Option<String>,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"{
        "droplets": [
            {
                "id": 3164444,
                "name": "master",
                "status": "active",
                "networks": {
                    "v4": [
                        {"ip_address": "10.128.192.124", "netmask": "255.255.0.0", "gateway": "nil", "type": "private"},
                        {"ip_address": "192.241.165.154", "netmask": "255.255.240.0", "gateway": "192.241.160.1", "type": "public"}
                    ],
                    "v6": []
                }
            },
            {
                "id": 3164445,
                "name": "slave0",
                "status": "new",
                "networks": {"v4": [], "v6": []}
            }
        ],
        "links": {"pages": {"last": "https://api.digitalocean.com/v2/droplets?page=3&per_page=2", "next": "https://api.digitalocean.com/v2/droplets?page=2&per_page=2"}},
        "meta": {"total": 6}
    }"#;

    #[test]
    fn test_page_maps_addresses_by_network_type() {
        let page: DropletPage = serde_json::from_str(PAGE).unwrap();
        assert!(page.has_next());

        let machines: Vec<Machine> = page.droplets.into_iter().map(Machine::from).collect();
        assert_eq!(machines[0].id.0, "3164444");
        assert_eq!(machines[0].public_ipv4.as_deref(), Some("192.241.165.154"));
        assert_eq!(machines[0].private_ipv4.as_deref(), Some("10.128.192.124"));
        assert_eq!(machines[1].name, "slave0");
        assert!(machines[1].public_ipv4.is_none());
        assert!(machines[1].private_ipv4.is_none());
    }

    #[test]
    fn test_last_page_has_no_next() {
        let page: DropletPage =
            serde_json::from_str(r#"{"droplets": [], "links": {}, "meta": {"total": 0}}"#).unwrap();
        assert!(!page.has_next());

        let bare: DropletPage = serde_json::from_str(r#"{"droplets": []}"#).unwrap();
        assert!(!bare.has_next());
    }

    #[test]
    fn test_create_request_body() {
        let spec = MachineSpec {
            ssh_key_fingerprints: vec!["9e:6a:0b".to_string()],
            ..MachineSpec::default()
        };
        let body = serde_json::to_value(CreateDropletRequest::new("slave3", &spec)).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "name": "slave3",
                "region": "sfo1",
                "size": "512mb",
                "image": "docker",
                "private_networking": true,
                "ssh_keys": ["9e:6a:0b"],
            })
        );
    }

    #[test]
    fn test_api_error_body() {
        let body: ApiErrorBody =
            serde_json::from_str(r#"{"id": "unauthorized", "message": "Unable to authenticate you."}"#)
                .unwrap();
        assert_eq!(body.id.as_deref(), Some("unauthorized"));
        assert_eq!(body.message, "Unable to authenticate you.");
    }
}
