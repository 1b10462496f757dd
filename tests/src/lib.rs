mod fingerprint;
mod netbios;
mod stubs;
