fn main() {
    // Messages are hand-written prost structs in src/messages.rs, so only the
    // service stubs are generated here and no protoc is needed.
    let service = tonic_build::manual::Service::builder()
        .name("LocationHistory")
        .package("geotrack.history")
        .method(
            tonic_build::manual::Method::builder()
                .name("update_location")
                .route_name("UpdateLocation")
                .input_type("crate::messages::LocationUpdate")
                .output_type("crate::messages::UpdateAck")
                .codec_path("tonic::codec::ProstCodec")
                .build(),
        )
        .method(
            tonic_build::manual::Method::builder()
                .name("get_distance")
                .route_name("GetDistance")
                .input_type("crate::messages::DistanceRequest")
                .output_type("crate::messages::DistanceResponse")
                .codec_path("tonic::codec::ProstCodec")
                .build(),
        )
        .build();

    tonic_build::manual::Builder::new().compile(&[service]);
}
