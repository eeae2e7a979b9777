// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Hosts a demo surface behind the render protocol.
//!
//! Serves a small built-in shape (a circle fused with an offset rectangle,
//! extruded for the 3D samplers) so a remote previewer has something to
//! connect to. Exits when a client sends the shutdown procedure.

use anyhow::{bail, Context};
use sdfscope_core::math::{Vec2, Vec3};
use sdfscope_core::surface::nodes::{Circle, Extrude, Rect, Translate2, Union2};
use sdfscope_core::surface::{Sdf2, Sdf3};
use sdfscope_remote::{transport, RenderService};
use sdfscope_render::{
    Field2Config, Field2Sampler, Mesh3Config, Mesh3Sampler, MeshSource, PixelSampler, RayConfig,
    Raycast3Sampler, Triangle,
};
use std::net::TcpListener;
use std::sync::Arc;

const DEFAULT_ADDR: &str = "127.0.0.1:4860";

struct Options {
    addr: String,
    dims: u32,
    mesh: bool,
}

fn usage() -> ! {
    eprintln!(
        "usage: sdfscope-serve [--addr HOST:PORT] [--dims 2|3] [--mesh]\n\
         \n\
         --addr   listen address (default {DEFAULT_ADDR})\n\
         --dims   serve the demo profile as a 2D field or an extruded solid\n\
         --mesh   with --dims 3, rasterize a mesh instead of ray marching"
    );
    std::process::exit(2);
}

fn parse_args() -> anyhow::Result<Options> {
    let mut options = Options {
        addr: DEFAULT_ADDR.to_string(),
        dims: 2,
        mesh: false,
    };
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--addr" => {
                options.addr = args.next().context("--addr needs a value")?;
            }
            "--dims" => {
                let value = args.next().context("--dims needs a value")?;
                options.dims = value.parse().context("--dims must be 2 or 3")?;
                if options.dims != 2 && options.dims != 3 {
                    bail!("--dims must be 2 or 3");
                }
            }
            "--mesh" => options.mesh = true,
            "-h" | "--help" => usage(),
            other => bail!("unknown argument: {other}"),
        }
    }
    if options.mesh && options.dims != 3 {
        bail!("--mesh requires --dims 3");
    }
    Ok(options)
}

/// The demo profile: a unit circle fused with a rectangle sticking out of
/// its right side.
fn demo_profile() -> Arc<dyn Sdf2> {
    let circle = Arc::new(Circle::new(1.0));
    let tab = Arc::new(Translate2::new(
        Arc::new(Rect::new(Vec2::new(1.6, 1.0))),
        Vec2::new(1.2, 0.0),
    ));
    Arc::new(Union2::new(circle, tab))
}

/// Streams the axis-aligned bounding box of the surface as twelve
/// triangles. A stand-in mesher so the rasterizing sampler can be served
/// without a meshing backend wired in.
struct BoundsMesher;

impl MeshSource for BoundsMesher {
    fn stream(&self, surface: Arc<dyn Sdf3>, _cells: u32) -> flume::Receiver<Triangle> {
        let bb = surface.bounding_box();
        let (a, b) = (bb.min, bb.max);
        let corner = move |x: f64, y: f64, z: f64| {
            Vec3::new(
                if x > 0.0 { b.x } else { a.x },
                if y > 0.0 { b.y } else { a.y },
                if z > 0.0 { b.z } else { a.z },
            )
        };
        let (tx, rx) = flume::bounded(16);
        std::thread::spawn(move || {
            // Two triangles per face, outward winding.
            let quads = [
                [(0., 0., 0.), (0., 1., 0.), (0., 1., 1.), (0., 0., 1.)], // -x
                [(1., 0., 0.), (1., 0., 1.), (1., 1., 1.), (1., 1., 0.)], // +x
                [(0., 0., 0.), (0., 0., 1.), (1., 0., 1.), (1., 0., 0.)], // -y
                [(0., 1., 0.), (1., 1., 0.), (1., 1., 1.), (0., 1., 1.)], // +y
                [(0., 0., 0.), (1., 0., 0.), (1., 1., 0.), (0., 1., 0.)], // -z
                [(0., 0., 1.), (0., 1., 1.), (1., 1., 1.), (1., 0., 1.)], // +z
            ];
            for [p0, p1, p2, p3] in quads {
                let v = [p0, p1, p2, p3].map(|(x, y, z)| corner(x, y, z));
                let first = Triangle {
                    a: v[0],
                    b: v[1],
                    c: v[2],
                };
                let second = Triangle {
                    a: v[0],
                    b: v[2],
                    c: v[3],
                };
                if tx.send(first).is_err() || tx.send(second).is_err() {
                    return;
                }
            }
        });
        rx
    }
}

fn build_sampler(options: &Options) -> Arc<dyn PixelSampler> {
    let profile = demo_profile();
    if options.dims == 2 {
        return Arc::new(Field2Sampler::new(profile, Field2Config::default()));
    }
    let solid: Arc<dyn Sdf3> = Arc::new(Extrude::new(profile, 1.0));
    if options.mesh {
        Arc::new(Mesh3Sampler::new(
            solid,
            Arc::new(BoundsMesher),
            Mesh3Config::default(),
        ))
    } else {
        Arc::new(Raycast3Sampler::new(solid, RayConfig::default()))
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let options = parse_args()?;
    let sampler = build_sampler(&options);
    log::info!(
        "serving {}D demo surface ({}) on {}",
        options.dims,
        if options.mesh { "mesh" } else { "field" },
        options.addr
    );

    let (shutdown_tx, shutdown_rx) = flume::bounded::<()>(0);
    let mut service = RenderService::new(sampler, shutdown_tx);
    let listener =
        TcpListener::bind(&options.addr).with_context(|| format!("bind {}", options.addr))?;

    // The accept loop owns the service; main only waits for the shutdown
    // rendezvous so the in-band Shutdown procedure has a live receiver.
    std::thread::spawn(move || {
        if let Err(e) = transport::serve(&listener, &mut service) {
            log::error!("listener failed: {e}");
            std::process::exit(1);
        }
    });

    shutdown_rx
        .recv()
        .context("shutdown channel closed unexpectedly")?;
    log::info!("shutdown requested, exiting");
    Ok(())
}
