//! Demonstration of geodesic mesh generation

use geodesic_mesh::*;

fn main() -> Result<()> {
    println!("Generating mesh...");

    let config = MeshConfigBuilder::new()
        .seed(42)
        .mesh_size(MeshSize::Tiny)
        .relax_cycles(2)
        .smoothing_passes(3)
        .build()?;

    let mesh = GeodesicMesh::generate(config)?;
    let stats = mesh.stats();

    println!("\nMesh statistics:");
    println!("  Points:         {}", stats.points);
    println!("  Edges:          {}", stats.edges);
    println!("  Triangles:      {}", stats.triangles);
    println!("  Dual points:    {}", stats.dual_points);
    println!("  Dual triangles: {}", stats.dual_triangles);
    println!(
        "  Edge length:    min {:.4}, mean {:.4}, max {:.4}",
        stats.min_edge_length, stats.mean_edge_length, stats.max_edge_length
    );

    let report = mesh.relax_report();
    println!("\nRelaxation:");
    println!("  Flips:           {}", report.flips);
    println!("  Abandoned:       {}", report.abandoned);
    println!("  Smoothing passes: {}", report.smoothing_passes);

    let issues = mesh.validate();
    println!("\nValidation: {} issue(s)", issues.len());
    for issue in issues.iter().take(10) {
        println!("  {}", issue);
    }

    #[cfg(feature = "spatial-index")]
    {
        let probe = Vec3::new(mesh.radius(), 0.0, 0.0);
        let nearest = mesh.find_point_at(probe);
        println!("\nNearest point to {:?}: {}", probe, nearest);
    }

    Ok(())
}
