//! Hand-rolled protobuf messages and client for the node's liveness RPC.
//!
//! Mirrors the shape `tonic-build` would generate from the network proto,
//! reduced to the single unary call the probe needs. The response declares
//! only its first field; unknown fields are skipped during decode, so any
//! well-formed reply counts as alive.

/// Messages and client for the `pactus.Network` service.
pub mod pactus {
    /// Request for the `GetNetworkInfo` liveness call.
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct GetNetworkInfoRequest {
        /// Restrict the reply to currently connected peers.
        #[prost(bool, tag = "1")]
        pub only_connected: bool,
    }

    /// Reply to the `GetNetworkInfo` liveness call.
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct GetNetworkInfoResponse {
        /// Name of the network the node is serving.
        #[prost(string, tag = "1")]
        pub network_name: ::prost::alloc::string::String,
    }

    /// Client for the `pactus.Network` service.
    pub mod network_client {
        use tonic::codegen::{http, Body, Bytes, GrpcMethod, StdError};

        /// A thin unary client over a connected channel.
        #[derive(Debug, Clone)]
        pub struct NetworkClient<T> {
            inner: tonic::client::Grpc<T>,
        }

        impl<T> NetworkClient<T>
        where
            T: tonic::client::GrpcService<tonic::body::BoxBody>,
            T::Error: Into<StdError>,
            T::ResponseBody: Body<Data = Bytes> + Send + 'static,
            <T::ResponseBody as Body>::Error: Into<StdError> + Send,
        {
            /// Wraps a transport (typically a `tonic::transport::Channel`).
            pub fn new(inner: T) -> Self {
                Self { inner: tonic::client::Grpc::new(inner) }
            }

            /// The liveness call: a reply, any reply, means the node is up.
            pub async fn get_network_info(
                &mut self,
                request: impl tonic::IntoRequest<super::GetNetworkInfoRequest>,
            ) -> Result<tonic::Response<super::GetNetworkInfoResponse>, tonic::Status>
            {
                self.inner.ready().await.map_err(|e| {
                    tonic::Status::unknown(format!("Service was not ready: {}", e.into()))
                })?;
                let codec = tonic::codec::ProstCodec::default();
                let path =
                    http::uri::PathAndQuery::from_static("/pactus.Network/GetNetworkInfo");
                let mut req = request.into_request();
                req.extensions_mut()
                    .insert(GrpcMethod::new("pactus.Network", "GetNetworkInfo"));
                self.inner.unary(req, path, codec).await
            }
        }
    }
}
