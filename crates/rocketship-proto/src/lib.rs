// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Generated protobuf/gRPC types and service traits for `rocketship.v1.Engine`.

/// Generated message and service code for the `rocketship.v1` package.
pub mod proto {
    tonic::include_proto!("rocketship.v1");

    /// Encoded `FileDescriptorSet` for the `rocketship.v1` package, used to
    /// register the gRPC server reflection service.
    pub const FILE_DESCRIPTOR_SET: &[u8] =
        tonic::include_file_descriptor_set!("engine_descriptor");
}
