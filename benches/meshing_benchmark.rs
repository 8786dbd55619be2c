//! Benchmarks for chunk filling and greedy meshing.
//!
//! Run with: cargo bench --bench meshing_benchmark

use cgmath::Point3;
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use voxel_terrain::generation::{NoiseTerrainGenerator, WorldGenerator};
use voxel_terrain::meshing::greedy_mesh;
use voxel_terrain::voxels::block::VoxelType;
use voxel_terrain::voxels::chunk::{Chunk, ChunkCoord, CHUNK_VOLUME};

fn generated_chunk(generator: &NoiseTerrainGenerator, coord: ChunkCoord) -> Chunk {
    let mut chunk = Chunk::new(coord);
    generator
        .generate_chunk_with_assets(&mut chunk, None)
        .expect("generation succeeds");
    chunk
}

fn benchmark_chunk_generation(c: &mut Criterion) {
    let generator = NoiseTerrainGenerator::from_seed(42);

    c.bench_function("single_chunk_generation", |b| {
        let mut coord = 0i32;
        b.iter(|| {
            coord = coord.wrapping_add(1);
            black_box(generated_chunk(&generator, ChunkCoord::new(coord, coord / 2)))
        });
    });

    let mut group = c.benchmark_group("chunk_grid");
    group.sample_size(10);
    // 8x8 chunks = 128x128 columns
    group.throughput(Throughput::Elements(8 * 8));
    group.bench_function("8x8_chunks", |b| {
        b.iter(|| {
            for z in 0..8 {
                for x in 0..8 {
                    black_box(generated_chunk(&generator, ChunkCoord::new(x, z)));
                }
            }
        });
    });
    group.finish();
}

fn benchmark_greedy_meshing(c: &mut Criterion) {
    let generator = NoiseTerrainGenerator::from_seed(42);
    let terrain = generated_chunk(&generator, ChunkCoord::new(3, 7));

    let mut group = c.benchmark_group("greedy_mesh");
    group.throughput(Throughput::Elements(CHUNK_VOLUME as u64));

    group.bench_function("generated_terrain", |b| {
        b.iter(|| black_box(greedy_mesh(black_box(terrain.voxels()))))
    });

    let mut solid = Chunk::new(ChunkCoord::new(0, 0));
    solid.fill_region(Point3::new(0, 0, 0), Point3::new(15, 63, 15), VoxelType::Stone);
    group.bench_function("solid_block", |b| {
        b.iter(|| black_box(greedy_mesh(black_box(solid.voxels()))))
    });

    // Worst case: nothing merges.
    let checkerboard: Vec<VoxelType> = (0..CHUNK_VOLUME)
        .map(|index| {
            let p = Chunk::position_of(index);
            if p.y < 32 && (p.x + p.y + p.z) % 2 == 0 {
                VoxelType::Stone
            } else {
                VoxelType::Air
            }
        })
        .collect();
    group.sample_size(20);
    group.bench_function("checkerboard", |b| {
        b.iter(|| black_box(greedy_mesh(black_box(&checkerboard))))
    });

    group.finish();
}

criterion_group!(benches, benchmark_chunk_generation, benchmark_greedy_meshing);
criterion_main!(benches);
