// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
use std::io::Result;
use std::path::PathBuf;

fn main() -> Result<()> {
    let descriptor_path = PathBuf::from(std::env::var("OUT_DIR").unwrap()).join("engine_descriptor.bin");

    tonic_build::configure()
        .build_server(true)
        .build_client(false)
        .file_descriptor_set_path(&descriptor_path)
        .compile_protos(&["proto/engine.proto"], &["proto/"])?;

    Ok(())
}
