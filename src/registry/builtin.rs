//! Built-in resource types
//!
//! Skeletons use `{rb}` for the REST base and the path placeholders for
//! ancestor and own identifiers.

use crate::error::Result;
use crate::registry::ResourceKind;
use crate::resource::JsonTemplate;
use serde_json::json;
use std::sync::Arc;

pub const VOLUME_PATH: &str = "Storage/{StorageId}/Volumes/{VolumeId}";
pub const NETWORK_INTERFACE_PATH: &str =
    "ResourceBlocks/{ResourceBlockId}/NetworkInterfaces/{NetworkInterfaceId}";

/// Storage volume
pub fn volume() -> Result<ResourceKind> {
    let skeleton = json!({
        "@Redfish.Copyright": "Copyright 2014-2021 SNIA. All rights reserved.",
        "@odata.id": "{rb}Storage/{StorageId}/Volumes/{VolumeId}",
        "@odata.type": "#Volume.v1_8_0.Volume",
        "Id": "{VolumeId}",
        "Name": "Volume {VolumeId}",
        "Description": "Volume in storage subsystem {StorageId}",
        "Status": {
            "State": "Enabled",
            "Health": "OK"
        },
        "CapacityBytes": 0,
        "RAIDType": "RAID0",
        "VolumeUsage": "Data",
        "Encrypted": false,
        "Links": {
            "Drives": [],
            "Drives@odata.count": 0
        },
        "Oem": {}
    });

    ResourceKind::new("Volume", VOLUME_PATH, Arc::new(JsonTemplate::new(skeleton)?))
}

/// Network interface of a composable resource block
pub fn network_interface() -> Result<ResourceKind> {
    let skeleton = json!({
        "@odata.id": "{rb}ResourceBlocks/{ResourceBlockId}/NetworkInterfaces/{NetworkInterfaceId}",
        "@odata.type": "#NetworkInterface.v1_2_0.NetworkInterface",
        "Id": "{NetworkInterfaceId}",
        "Name": "Network Interface {NetworkInterfaceId}",
        "Description": "Network interface of resource block {ResourceBlockId}",
        "Status": {
            "State": "Enabled",
            "Health": "OK"
        },
        "Links": {
            "NetworkAdapter": {
                "@odata.id": "{rb}Chassis/{ResourceBlockId}/NetworkAdapters/{NetworkInterfaceId}"
            }
        },
        "NetworkPorts": {
            "@odata.id": "{rb}ResourceBlocks/{ResourceBlockId}/NetworkInterfaces/{NetworkInterfaceId}/NetworkPorts"
        },
        "NetworkDeviceFunctions": {
            "@odata.id": "{rb}ResourceBlocks/{ResourceBlockId}/NetworkInterfaces/{NetworkInterfaceId}/NetworkDeviceFunctions"
        }
    });

    ResourceKind::new(
        "NetworkInterface",
        NETWORK_INTERFACE_PATH,
        Arc::new(JsonTemplate::new(skeleton)?),
    )
}

/// Every built-in type
pub fn all() -> Result<Vec<ResourceKind>> {
    Ok(vec![volume()?, network_interface()?])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::Wildcards;

    #[test]
    fn test_volume_template_renders() {
        let kind = volume().unwrap();
        let doc = kind
            .generator()
            .instance(
                &Wildcards::new()
                    .with("rb", "/redfish/v1/")
                    .with("StorageId", "S1")
                    .with("VolumeId", "V1"),
            )
            .unwrap();

        assert_eq!(doc["@odata.id"], "/redfish/v1/Storage/S1/Volumes/V1");
        assert_eq!(doc["Id"], "V1");
        assert_eq!(doc["Description"], "Volume in storage subsystem S1");
    }

    #[test]
    fn test_network_interface_template_renders() {
        let kind = network_interface().unwrap();
        assert_eq!(kind.collection_template().as_str(), "ResourceBlocks/{ResourceBlockId}/NetworkInterfaces");

        let doc = kind
            .generator()
            .instance(
                &Wildcards::new()
                    .with("rb", "/redfish/v1/")
                    .with("ResourceBlockId", "RB1")
                    .with("NetworkInterfaceId", "NI1"),
            )
            .unwrap();
        assert_eq!(
            doc["NetworkPorts"]["@odata.id"],
            "/redfish/v1/ResourceBlocks/RB1/NetworkInterfaces/NI1/NetworkPorts"
        );
    }
}
