//! Standard test fixtures with realistic MIB data.

use snmp_manager::{Oid, Value, oid};
use std::collections::BTreeMap;

/// Read-only community.
pub const COMMUNITY_RO: &str = "public";

/// Read-write community.
pub const COMMUNITY_RW: &str = "private";

/// System group (1.3.6.1.2.1.1) of a Linux box.
pub fn system_mib() -> BTreeMap<Oid, Value> {
    let mut data = BTreeMap::new();

    data.insert(sys_descr(), Value::from("Linux host"));
    data.insert(
        oid!(1, 3, 6, 1, 2, 1, 1, 2, 0),
        Value::ObjectIdentifier(oid!(1, 3, 6, 1, 4, 1, 8072, 3, 2, 10)),
    );
    data.insert(sys_uptime(), Value::TimeTicks(123456));
    data.insert(sys_contact(), Value::from("root@localhost"));
    data.insert(sys_name(), Value::from("test-agent"));
    data.insert(oid!(1, 3, 6, 1, 2, 1, 1, 6, 0), Value::from("Test Lab"));
    data.insert(oid!(1, 3, 6, 1, 2, 1, 1, 7, 0), Value::Integer(72));

    data
}

/// ifNumber plus `count` rows of ifIndex/ifDescr/ifType/ifSpeed.
pub fn interface_table(count: u32) -> BTreeMap<Oid, Value> {
    let mut data = BTreeMap::new();
    data.insert(oid!(1, 3, 6, 1, 2, 1, 2, 1, 0), Value::Integer(count as i32));

    for i in 1..=count {
        data.insert(oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 1, i), Value::Integer(i as i32));
        data.insert(
            oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 2, i),
            Value::from(format!("eth{}", i - 1)),
        );
        data.insert(oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 3, i), Value::Integer(6));
        data.insert(
            oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 5, i),
            Value::Gauge32(1_000_000_000),
        );
    }

    data
}

/// sysDescr.0
pub fn sys_descr() -> Oid {
    oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)
}

/// sysUpTime.0
pub fn sys_uptime() -> Oid {
    oid!(1, 3, 6, 1, 2, 1, 1, 3, 0)
}

/// sysContact.0
pub fn sys_contact() -> Oid {
    oid!(1, 3, 6, 1, 2, 1, 1, 4, 0)
}

/// sysName.0
pub fn sys_name() -> Oid {
    oid!(1, 3, 6, 1, 2, 1, 1, 5, 0)
}

/// system subtree
pub fn system_subtree() -> Oid {
    oid!(1, 3, 6, 1, 2, 1, 1)
}

/// interfaces subtree
pub fn interfaces_subtree() -> Oid {
    oid!(1, 3, 6, 1, 2, 1, 2)
}

/// An OID no fixture defines.
pub fn nonexistent_oid() -> Oid {
    oid!(1, 3, 6, 1, 4, 1, 99999, 1, 0)
}
